//! OAuth 2.0 error types.
//!
//! [`OAuth2Error`] is the single error value that flows through the
//! authorization orchestrator. Besides the categorical [`ErrorCode`] and a
//! human readable description it carries:
//!
//! - an optional internal cause, kept for diagnostics and never copied into
//!   a description that leaves this node
//! - an optional redirect target; once set, the failure is delivered to that
//!   URI as `error`/`error_description` query parameters instead of being
//!   rendered locally

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Query/form parameter carrying the error code.
pub const ERROR_PARAM: &str = "error";

/// Query/form parameter carrying the error description.
pub const ERROR_DESCRIPTION_PARAM: &str = "error_description";

/// OAuth 2.0 error codes (RFC 6749 §4.1.2.1, §5.2 and OpenID4VP §6.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing, malformed or inconsistent input.
    InvalidRequest,
    /// The client may not use this method.
    UnauthorizedClient,
    /// The resource owner or server denied the request.
    AccessDenied,
    /// Unsupported `response_type`.
    UnsupportedResponseType,
    /// Unsupported `grant_type`.
    UnsupportedGrantType,
    /// The requested scope is invalid or unknown.
    InvalidScope,
    /// The grant is invalid, expired or issued to another client.
    InvalidGrant,
    /// Internal failure or unreachable dependency.
    ServerError,
    /// The presentation definition could not be retrieved from
    /// `presentation_definition_uri`.
    InvalidPresentationDefinitionUri,
    /// A code received from a remote party that this node does not define.
    Other(String),
}

impl ErrorCode {
    /// Returns the wire representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidGrant => "invalid_grant",
            Self::ServerError => "server_error",
            Self::InvalidPresentationDefinitionUri => "invalid_presentation_definition_uri",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "invalid_request" => Self::InvalidRequest,
            "unauthorized_client" => Self::UnauthorizedClient,
            "access_denied" => Self::AccessDenied,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            "invalid_grant" => Self::InvalidGrant,
            "server_error" => Self::ServerError,
            "invalid_presentation_definition_uri" => Self::InvalidPresentationDefinitionUri,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(code) => code,
            Err(never) => match never {},
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// An OAuth 2.0 error together with where it should be delivered.
#[derive(Debug, Clone)]
pub struct OAuth2Error {
    /// Categorical error code.
    pub code: ErrorCode,

    /// Description that may be shown to the end user or remote party.
    pub description: String,

    /// Underlying cause, for logs only.
    pub internal_error: Option<Arc<dyn StdError + Send + Sync>>,

    /// Where the error must be delivered. `None` means the error is
    /// returned to the immediate caller without redirecting.
    pub redirect_uri: Option<Url>,
}

impl OAuth2Error {
    /// Creates a new error without cause or redirect target.
    #[must_use]
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            internal_error: None,
            redirect_uri: None,
        }
    }

    /// Creates an `invalid_request` error.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, description)
    }

    /// Creates a `server_error` error.
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, description)
    }

    /// Creates an `invalid_grant` error.
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, description)
    }

    /// Creates an `unsupported_grant_type` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedGrantType,
            format!("unsupported grant_type: {grant_type}"),
        )
    }

    /// Creates an `unsupported_response_type` error.
    #[must_use]
    pub fn unsupported_response_type(response_type: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedResponseType,
            format!("unsupported response_type: {response_type}"),
        )
    }

    /// Attaches the internal cause.
    #[must_use]
    pub fn with_internal_error(mut self, err: impl StdError + Send + Sync + 'static) -> Self {
        self.internal_error = Some(Arc::new(err));
        self
    }

    /// Sets the delivery target. Once set it is never cleared by later
    /// stages of the same attempt.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: Option<&Url>) -> Self {
        self.redirect_uri = redirect_uri.cloned();
        self
    }

    /// Returns `true` for `server_error`.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.code == ErrorCode::ServerError
    }

    /// Builds the URL the user agent is redirected to, if a delivery target
    /// is known.
    #[must_use]
    pub fn to_redirect_url(&self) -> Option<Url> {
        let mut url = self.redirect_uri.clone()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(ERROR_PARAM, self.code.as_str());
            if !self.description.is_empty() {
                pairs.append_pair(ERROR_DESCRIPTION_PARAM, &self.description);
            }
        }
        Some(url)
    }

    /// JSON body used by the token and response endpoints.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code.clone(),
            error_description: (!self.description.is_empty()).then(|| self.description.clone()),
        }
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} - {}", self.code, self.description)
        }
    }
}

impl StdError for OAuth2Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.internal_error
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Serialized OAuth 2.0 error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code.
    pub error: ErrorCode,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip_known_and_unknown() {
        assert_eq!(ErrorCode::from("invalid_request"), ErrorCode::InvalidRequest);
        assert_eq!(
            ErrorCode::from("invalid_presentation_definition_uri"),
            ErrorCode::InvalidPresentationDefinitionUri
        );
        assert_eq!(
            ErrorCode::from("vp_formats_not_supported"),
            ErrorCode::Other("vp_formats_not_supported".to_string())
        );
        assert_eq!(
            ErrorCode::Other("vp_formats_not_supported".into()).as_str(),
            "vp_formats_not_supported"
        );
    }

    #[test]
    fn test_error_display() {
        let err = OAuth2Error::invalid_request("missing nonce parameter");
        assert_eq!(err.to_string(), "invalid_request - missing nonce parameter");

        let err = OAuth2Error::new(ErrorCode::ServerError, "");
        assert_eq!(err.to_string(), "server_error");
    }

    #[test]
    fn test_internal_error_is_source_not_description() {
        let cause = std::io::Error::other("disk on fire");
        let err = OAuth2Error::server_error("failed to store server state").with_internal_error(cause);

        assert_eq!(err.description, "failed to store server state");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("disk on fire"));
        assert!(!err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_to_redirect_url() {
        let target = Url::parse("https://a.example/cb?keep=1").unwrap();
        let err = OAuth2Error::invalid_request("invalid or expired nonce")
            .with_redirect_uri(Some(&target));

        let url = err.to_redirect_url().unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("keep".into(), "1".into())));
        assert!(pairs.contains(&("error".into(), "invalid_request".into())));
        assert!(pairs.contains(&(
            "error_description".into(),
            "invalid or expired nonce".into()
        )));

        assert!(OAuth2Error::server_error("x").to_redirect_url().is_none());
    }

    #[test]
    fn test_error_body_serialization() {
        let body = OAuth2Error::invalid_grant("").to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "invalid_grant"}));

        let parsed: ErrorBody =
            serde_json::from_str(r#"{"error":"server_error","error_description":"boom"}"#).unwrap();
        assert_eq!(parsed.error, ErrorCode::ServerError);
        assert_eq!(parsed.error_description.as_deref(), Some("boom"));
    }
}

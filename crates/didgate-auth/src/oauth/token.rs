//! Token endpoint types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::pe::{CredentialMap, PresentationDefinition, PresentationSubmission};
use crate::vc::VerifiablePresentation;

/// Access token type issued by this node.
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Token request form.
///
/// Fields required per grant type:
///
/// - `authorization_code`: code, redirect_uri, client_id
/// - `urn:ietf:params:oauth:grant-type:vp_token-bearer`: assertion,
///   presentation_submission, scope
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    pub grant_type: String,

    /// Authorization code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Redirect URI of the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Client identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// PKCE code verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,

    /// Presentation used as authorization grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,

    /// Submission describing the assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<String>,

    /// Requested scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Successful token response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type, `Bearer` or `DPoP`.
    pub token_type: String,

    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Granted scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Server side record of an issued access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The token value.
    pub token: String,

    /// Identifier of the issuing party.
    pub issuer: String,

    /// Party the token was issued to.
    pub client_id: String,

    /// Granted scope.
    pub scope: String,

    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Presentations the token was granted on.
    pub presentations: Vec<VerifiablePresentation>,

    /// Submission of those presentations.
    pub submission: PresentationSubmission,

    /// Definition the presentations fulfilled.
    pub presentation_definition: PresentationDefinition,

    /// Matched credential per input descriptor id.
    pub credential_map: CredentialMap,

    /// Values of constraint fields carrying an `id`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_descriptor_constraint_id_map: BTreeMap<String, Value>,
}

impl AccessToken {
    /// Returns `true` while the token has not expired at `now`.
    #[must_use]
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }

    /// Remaining lifetime in whole seconds at `now`.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> u64 {
        u64::try_from((self.expires_at - now).whole_seconds()).unwrap_or(0)
    }
}

//! Metadata documents exchanged during discovery.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::pe::VpFormats;

/// OAuth 2.0 Authorization Server Metadata (RFC 8414) with the OpenID4VP
/// wallet extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier.
    pub issuer: String,

    /// Authorization endpoint.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint.
    #[serde(default)]
    pub token_endpoint: String,

    /// Endpoint serving presentation definitions by scope.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub presentation_definition_endpoint: String,

    /// Supported response types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types_supported: Vec<String>,

    /// Supported response modes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_modes_supported: Vec<String>,

    /// Supported grant types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_types_supported: Vec<String>,

    /// Client id schemes the wallet accepts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_id_schemes_supported: Vec<String>,

    /// Presentation formats the server supports.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vp_formats_supported: VpFormats,

    /// Whether signed request objects are required.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_signed_request_object: bool,

    /// DPoP signing algorithms.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dpop_signing_alg_values_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Returns `true` if `scheme` is listed in `client_id_schemes_supported`.
    #[must_use]
    pub fn supports_client_id_scheme(&self, scheme: &str) -> bool {
        self.client_id_schemes_supported.iter().any(|s| s == scheme)
    }
}

/// OAuth 2.0 Dynamic Client Registration metadata (RFC 7591) with the
/// `vp_formats` extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthClientMetadata {
    /// Redirection URIs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,

    /// Token endpoint authentication method.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_endpoint_auth_method: String,

    /// Grant types the client uses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_types: Vec<String>,

    /// Response types the client uses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types: Vec<String>,

    /// Space separated scopes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,

    /// Human readable client name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_name: String,

    /// Client home page.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_uri: String,

    /// Presentation formats the client accepts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vp_formats: VpFormats,
}

/// OpenID Provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenIdConfigurationMetadata {
    /// Issuer identifier.
    pub issuer: String,

    /// Authorization endpoint.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint.
    #[serde(default)]
    pub token_endpoint: String,

    /// JWK set location.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jwks_uri: String,

    /// Supported scopes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Supported response types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types_supported: Vec<String>,

    /// Remaining members.
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

/// OpenID4VCI credential issuer metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenIdCredentialIssuerMetadata {
    /// Issuer identifier.
    pub credential_issuer: String,

    /// Credential endpoint.
    pub credential_endpoint: String,

    /// Authorization servers trusted by the issuer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorization_servers: Vec<String>,

    /// Credentials the issuer offers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials_supported: Vec<Value>,

    /// Display properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<Value>,
}

/// Response of a credential endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialResponse {
    /// Format of the issued credential.
    pub format: String,

    /// The credential, a JWT string or a JSON-LD object.
    pub credential: Value,

    /// Nonce for the next proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,
}

/// Body returned by a `direct_post` response endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectResponse {
    /// Where the wallet sends the user agent next.
    pub redirect_uri: String,
}

impl RedirectResponse {
    /// Wraps a URL.
    #[must_use]
    pub fn new(url: &Url) -> Self {
        Self {
            redirect_uri: url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_authorization_server_metadata_schemes() {
        let metadata: AuthorizationServerMetadata = serde_json::from_value(json!({
            "issuer": "https://wallet.example/iam/1",
            "authorization_endpoint": "https://wallet.example/iam/1/authorize",
            "client_id_schemes_supported": ["did", "redirect_uri"],
            "vp_formats_supported": { "ldp_vp": { "proof_type": ["JsonWebSignature2020"] } }
        }))
        .unwrap();

        assert!(metadata.supports_client_id_scheme("did"));
        assert!(!metadata.supports_client_id_scheme("x509_san_dns"));
        assert!(metadata.token_endpoint.is_empty());
        assert!(metadata.vp_formats_supported.contains_key("ldp_vp"));
    }

    #[test]
    fn test_openid_configuration_keeps_unknown_members() {
        let config: OpenIdConfigurationMetadata = serde_json::from_value(json!({
            "issuer": "https://issuer.example",
            "token_endpoint": "https://issuer.example/token",
            "pre-authorized_grant_anonymous_access_supported": true
        }))
        .unwrap();

        assert_eq!(
            config.additional.get("pre-authorized_grant_anonymous_access_supported"),
            Some(&json!(true))
        );
    }
}

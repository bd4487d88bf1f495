//! OAuth 2.0 and OpenID4VP protocol types.
//!
//! - [`params`] - parameter names and fixed values
//! - [`metadata`] - discovery documents
//! - [`session`] - authorization session state
//! - [`token`] - token endpoint types and access token records

pub mod metadata;
pub mod params;
pub mod session;
pub mod token;

pub use metadata::{
    AuthorizationServerMetadata, CredentialResponse, OAuthClientMetadata,
    OpenIdConfigurationMetadata, OpenIdCredentialIssuerMetadata, RedirectResponse,
};
pub use session::{OAuthSession, ServerState, generate_nonce};
pub use token::{AccessToken, BEARER_TOKEN_TYPE, TokenRequest, TokenResponse};

use url::Url;

/// Appends query parameters to `url`, keeping existing ones. Empty values
/// are skipped.
#[must_use]
pub fn add_query_params(mut url: Url, params: &[(&str, &str)]) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            if !value.is_empty() {
                pairs.append_pair(key, value);
            }
        }
    }
    // query_pairs_mut leaves an empty `?` when nothing was appended
    if url.query() == Some("") {
        url.set_query(None);
    }
    url
}

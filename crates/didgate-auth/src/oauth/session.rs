//! Authorization session state.
//!
//! # Lifecycle
//!
//! 1. Created by the holder-initiated authorization request and stored
//!    under its nonce and its client state
//! 2. Recovered by nonce when the wallet posts its presentations; on
//!    success the [`ServerState`] is attached and the session is stored
//!    under a fresh authorization code
//! 3. Taken by the token exchange, which retires the code
//!
//! # Security
//!
//! - Nonces, states and codes are 256-bit random values, base64url-encoded
//! - Every key is single use and bounded by the flow timeout

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::did::Did;
use crate::pe::{CredentialMap, PresentationDefinition, PresentationSubmission};
use crate::vc::VerifiablePresentation;

/// Generates a 256-bit random value, base64url-encoded without padding.
///
/// Used for nonces, client state, authorization codes and access tokens.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One in-flight or completed authorization attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthSession {
    /// DID of the party that requested authorization.
    pub client_id: String,

    /// Requested scope.
    #[serde(default)]
    pub scope: String,

    /// This node's identifier in the flow.
    pub own_did: Did,

    /// State value of the client, echoed on redirect.
    #[serde(default)]
    pub client_state: String,

    /// Where the user agent returns to.
    pub redirect_uri: String,

    /// Requested response type.
    #[serde(default)]
    pub response_type: String,

    /// Definition the presentations are matched against, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<PresentationDefinition>,

    /// Result of a successful presentation validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_state: Option<ServerState>,
}

impl OAuthSession {
    /// Parsed redirect URI, `None` if absent or unparsable.
    #[must_use]
    pub fn redirect_url(&self) -> Option<Url> {
        Url::parse(&self.redirect_uri).ok()
    }
}

/// Accepted presentations of a validated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    /// Matched credential per input descriptor id.
    pub credential_map: CredentialMap,

    /// Presentations as received.
    pub presentations: Vec<VerifiablePresentation>,

    /// Accepted submission.
    pub submission: PresentationSubmission,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_nonce() {
        let nonces: HashSet<String> = (0..64).map(|_| generate_nonce()).collect();
        assert_eq!(nonces.len(), 64);

        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 43);
        assert!(!nonce.contains('='));
        assert!(!nonce.contains('+'));
        assert!(!nonce.contains('/'));
    }

    #[test]
    fn test_session_serialization_without_server_state() {
        let session = OAuthSession {
            client_id: "did:web:a.example:iam:1".into(),
            scope: "example-scope".into(),
            own_did: Did::parse("did:web:node.example:iam:2").unwrap(),
            client_state: "state".into(),
            redirect_uri: "https://a.example/cb".into(),
            response_type: "code".into(),
            presentation_definition: None,
            server_state: None,
        };

        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("server_state").is_none());
        assert_eq!(json["own_did"], "did:web:node.example:iam:2");

        let back: OAuthSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
        assert_eq!(back.redirect_url().unwrap().as_str(), "https://a.example/cb");
    }
}

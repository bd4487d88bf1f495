//! Collaborator interfaces.
//!
//! The orchestrator sequences calls into services it does not implement:
//! credential verification, the local wallet, key resolution and signing,
//! DID ownership and resolution, and the policy that maps scopes to
//! presentation definitions. Each is consumed through a narrow async trait
//! held as `Arc<dyn Trait>`.
//!
//! [`VerifierRole`] and [`HolderRole`] group the outbound calls the
//! orchestrator makes in each role. The remote client implements both.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::client::ClientError;
use crate::client::dpop::DpopToken;
use crate::did::Did;
use crate::error::OAuth2Error;
use crate::oauth::{AuthorizationServerMetadata, OAuthClientMetadata};
use crate::pe::{PresentationDefinition, PresentationSubmission, VpFormats};
use crate::vc::{VerifiableCredential, VerifiablePresentation};

/// Errors reported by collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The wallet holds no credentials matching the definition.
    #[error("no matching credentials")]
    NoCredentials,

    /// Input rejected by the collaborator, e.g. a failed signature check.
    #[error("invalid: {0}")]
    Invalid(String),

    /// The collaborator failed.
    #[error("{0}")]
    Internal(String),
}

/// Verifies signatures and validity of presentations and their credentials.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verifies `presentation`. With `verify_credentials` the embedded
    /// credentials are verified as well. `valid_at` defaults to now.
    async fn verify_vp(
        &self,
        presentation: &VerifiablePresentation,
        verify_credentials: bool,
        valid_at: Option<OffsetDateTime>,
    ) -> Result<Vec<VerifiableCredential>, ProviderError>;
}

/// Maps scopes to presentation definitions.
#[async_trait]
pub trait PolicyBackend: Send + Sync {
    /// Definition required by `authorizer` for `scope`.
    ///
    /// Returns `ProviderError::NotFound` for unknown scopes.
    async fn presentation_definition(
        &self,
        authorizer: &Did,
        scope: &str,
    ) -> Result<PresentationDefinition, ProviderError>;
}

/// Parameters for building a presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildParams {
    /// Intended audience.
    pub audience: String,
    /// Expiry of the presentation.
    pub expires: OffsetDateTime,
    /// Challenge binding the presentation.
    pub nonce: String,
}

/// The local credential wallet.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Selects credentials of `holder` that fulfil `definition` and builds a
    /// presentation in one of `formats` together with its submission.
    ///
    /// Returns `ProviderError::NoCredentials` if the definition cannot be
    /// fulfilled.
    async fn build_submission(
        &self,
        holder: &Did,
        definition: &PresentationDefinition,
        formats: &VpFormats,
        params: BuildParams,
    ) -> Result<(VerifiablePresentation, PresentationSubmission), ProviderError>;

    /// Builds and signs a presentation of `credentials` as `holder`.
    async fn build_presentation(
        &self,
        credentials: &[VerifiableCredential],
        holder: &Did,
        params: BuildParams,
    ) -> Result<VerifiablePresentation, ProviderError>;

    /// Credentials held by `holder`.
    async fn list(&self, holder: &Did) -> Result<Vec<VerifiableCredential>, ProviderError>;
}

/// Verification relationships of a DID document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRelation {
    /// `assertionMethod`
    AssertionMethod,
    /// `authentication`
    Authentication,
}

/// Resolves signing keys for DIDs.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Key id of a key of `did` with relation `relation`.
    async fn resolve_key(&self, did: &Did, relation: KeyRelation) -> Result<String, ProviderError>;
}

/// Signs proof-of-possession tokens.
#[async_trait]
pub trait DpopSigner: Send + Sync {
    /// Signs `token` with the key `key_id` and returns the compact JWT.
    async fn sign_dpop(&self, token: &DpopToken, key_id: &str) -> Result<String, ProviderError>;
}

/// Tells whether this node controls a DID.
#[async_trait]
pub trait DocumentOwner: Send + Sync {
    /// Returns `true` if `did` is managed by this node.
    async fn is_owner(&self, did: &Did) -> Result<bool, ProviderError>;
}

/// A resolved DID document, reduced to what callers walk over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// Subject of the document.
    pub id: Did,

    /// Controllers of the subject.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub controller: Vec<Did>,

    /// Service endpoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

/// A DID document service entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Service id.
    pub id: String,

    /// Service type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Endpoint, a URL string, map or list.
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: serde_json::Value,
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Did>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Did),
        Many(Vec<Did>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(did) => vec![did],
        OneOrMany::Many(dids) => dids,
    })
}

/// Resolves DID documents.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolves `did`.
    async fn resolve(&self, did: &Did) -> Result<DidDocument, ProviderError>;
}

/// Outbound calls made while acting as verifier.
#[async_trait]
pub trait VerifierRole: Send + Sync {
    /// Authorization server metadata of the wallet identified by `wallet`.
    async fn authorization_server_metadata(
        &self,
        wallet: &Did,
    ) -> Result<AuthorizationServerMetadata, ClientError>;

    /// Location of this node's client metadata for `verifier`.
    fn client_metadata_url(&self, verifier: &Did) -> Result<Url, ClientError>;
}

/// Outbound calls made while acting as holder (wallet).
#[async_trait]
pub trait HolderRole: Send + Sync {
    /// Client metadata of the verifier at `endpoint`.
    async fn client_metadata(&self, endpoint: &str) -> Result<OAuthClientMetadata, ClientError>;

    /// Presentation definition at `endpoint`.
    async fn presentation_definition(
        &self,
        endpoint: &str,
    ) -> Result<PresentationDefinition, ClientError>;

    /// Builds a presentation of credentials of `wallet` for `audience`.
    async fn build_presentation(
        &self,
        wallet: &Did,
        definition: &PresentationDefinition,
        accepted_formats: &VpFormats,
        nonce: &str,
        audience: &str,
    ) -> Result<(VerifiablePresentation, PresentationSubmission), ProviderError>;

    /// Posts the presentation to the verifier response endpoint and
    /// returns the redirect location it answers with.
    async fn post_authorization_response(
        &self,
        presentation: &VerifiablePresentation,
        submission: &PresentationSubmission,
        response_uri: &str,
        state: &str,
    ) -> Result<String, ClientError>;

    /// Posts an error to the verifier response endpoint and returns the
    /// redirect location it answers with.
    async fn post_error(
        &self,
        error: &OAuth2Error,
        response_uri: &str,
        state: &str,
    ) -> Result<String, ClientError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_did_document_controller_forms() {
        let single: DidDocument = serde_json::from_value(json!({
            "id": "did:web:a.example",
            "controller": "did:web:b.example"
        }))
        .unwrap();
        assert_eq!(single.controller.len(), 1);

        let many: DidDocument = serde_json::from_value(json!({
            "id": "did:web:a.example",
            "controller": ["did:web:b.example", "did:web:c.example"],
            "service": [{ "id": "#api", "type": "Api", "serviceEndpoint": "https://a.example" }]
        }))
        .unwrap();
        assert_eq!(many.controller.len(), 2);
        assert_eq!(many.service[0].type_, "Api");

        let none: DidDocument = serde_json::from_value(json!({"id": "did:web:a.example"})).unwrap();
        assert!(none.controller.is_empty());
    }
}

//! Authorization request orchestration.
//!
//! [`OpenId4VpService`] sequences the OpenID4VP flows of a node that acts
//! as authorization server toward wallets and as wallet toward remote
//! verifiers:
//!
//! - [`authorize`] - holder-initiated and verifier-initiated authorization
//!   requests
//! - [`direct_post`] - delivering presentations and errors to a verifier
//!   response endpoint
//! - [`response`] - the response endpoint: error relay and the
//!   presentation validation pipeline
//! - [`token`] - authorization code exchange and access token records
//! - [`metadata`] - discovery documents of owned identifiers
//!
//! # Error delivery
//!
//! Every operation returns an [`OAuth2Error`] on failure. Errors without a
//! redirect target are rendered to the immediate caller; once a trustworthy
//! target is known, errors carry it and are delivered there.

pub mod authorize;
pub mod direct_post;
pub mod metadata;
pub mod response;
pub mod token;
mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::config::{AuthConfig, ConfigError};
use crate::did::{Did, web};
use crate::error::OAuth2Error;
use crate::oauth::{AccessToken, OAuthSession};
use crate::provider::{CredentialVerifier, DocumentOwner, HolderRole, PolicyBackend, VerifierRole};
use crate::storage::{Namespace, SessionDatabase, SessionStore, StoreError};

pub use response::AuthorizationResponse;

/// Query or form parameters of an inbound request.
pub type Params = HashMap<String, String>;

/// Result of an orchestrator operation.
pub type FlowResult<T> = Result<T, OAuth2Error>;

/// Path segment below the public URL holding owned identifiers.
pub const IAM_PATH: &str = "iam";

/// External services the orchestrator calls into.
#[derive(Clone)]
pub struct Collaborators {
    /// Outbound calls in the verifier role.
    pub verifier: Arc<dyn VerifierRole>,
    /// Outbound calls in the holder role.
    pub holder: Arc<dyn HolderRole>,
    /// Signature and validity checks.
    pub credential_verifier: Arc<dyn CredentialVerifier>,
    /// Scope to presentation definition mapping.
    pub policy: Arc<dyn PolicyBackend>,
    /// Ownership of identifiers.
    pub document_owner: Arc<dyn DocumentOwner>,
}

/// The OpenID4VP orchestrator.
#[derive(Clone)]
pub struct OpenId4VpService {
    collaborators: Collaborators,
    db: Arc<dyn SessionDatabase>,
    config: AuthConfig,
    public_url: Url,
}

impl std::fmt::Debug for OpenId4VpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenId4VpService")
            .field("public_url", &self.public_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OpenId4VpService {
    /// Creates the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` does not validate.
    pub fn new(
        collaborators: Collaborators,
        db: Arc<dyn SessionDatabase>,
        config: AuthConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let public_url = config.public_url()?;
        Ok(Self {
            collaborators,
            db,
            config,
            public_url,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The `did:web` identifier of `{public_url}/iam/{id}`, without
    /// checking ownership.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if `id` does not form a valid identifier.
    pub fn did_for_id(&self, id: &str) -> FlowResult<Did> {
        if id.is_empty() || id.contains('/') {
            return Err(OAuth2Error::invalid_request("invalid identifier"));
        }
        let mut url = self.public_url.clone();
        let base = self.public_url.path().trim_end_matches('/');
        url.set_path(&format!("{base}/{IAM_PATH}/{id}"));
        url.set_query(None);
        url.set_fragment(None);
        web::url_to_did(&url).map_err(|e| {
            OAuth2Error::invalid_request("invalid identifier").with_internal_error(e)
        })
    }

    /// Resolves `id` to an identifier owned by this node.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` with `unknown` as description if the
    /// identifier is not owned, `server_error` if ownership cannot be
    /// determined.
    pub async fn owned_did(&self, id: &str, unknown: &str) -> FlowResult<Did> {
        let did = self
            .did_for_id(id)
            .map_err(|e| OAuth2Error::invalid_request(unknown).with_internal_error(e))?;
        match self.collaborators.document_owner.is_owner(&did).await {
            Ok(true) => Ok(did),
            Ok(false) => {
                tracing::debug!(did = %did, "Identifier is not owned by this node");
                Err(OAuth2Error::invalid_request(unknown))
            }
            Err(e) => {
                tracing::error!(did = %did, error = %e, "Failed to check identifier ownership");
                Err(OAuth2Error::server_error("failed to resolve identifier").with_internal_error(e))
            }
        }
    }

    fn session_store(&self, namespace: Namespace) -> SessionStore<OAuthSession> {
        SessionStore::new(Arc::clone(&self.db), namespace, self.config.oauth.flow_timeout)
    }

    fn nonce_store(&self, owner: &Did) -> SessionStore<OAuthSession> {
        self.session_store(Namespace::nonce(owner))
    }

    fn client_state_store(&self, owner: &Did) -> SessionStore<OAuthSession> {
        self.session_store(Namespace::client_state(owner))
    }

    fn code_store(&self, owner: &Did) -> SessionStore<OAuthSession> {
        self.session_store(Namespace::code(owner))
    }

    fn access_token_store(&self, owner: &Did) -> SessionStore<AccessToken> {
        SessionStore::new(
            Arc::clone(&self.db),
            Namespace::access_token(owner),
            self.config.oauth.access_token_lifetime,
        )
    }
}

/// Maps a failed session lookup: a missing or expired key is a client
/// error described by `not_found`, anything else is a server error.
fn lookup_error(err: StoreError, not_found: &str) -> OAuth2Error {
    if err.is_not_found() {
        OAuth2Error::invalid_request(not_found)
    } else {
        tracing::error!(error = %err, "Session store lookup failed");
        OAuth2Error::server_error("failed to read server state").with_internal_error(err)
    }
}

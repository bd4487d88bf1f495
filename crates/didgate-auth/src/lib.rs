//! # didgate-auth
//!
//! OpenID4VP authorization for nodes that expose `did:web` identifiers.
//!
//! A node acts in two roles:
//! - as **verifier / authorization server**: it asks a wallet for a
//!   verifiable presentation, validates what the wallet posts back and
//!   exchanges the resulting authorization code for an access token
//! - as **wallet**: it answers presentation requests of remote verifiers by
//!   building a presentation and posting it to their response endpoint
//!
//! ## Modules
//!
//! - [`config`] - Authorization configuration
//! - [`did`] - DID parsing and `did:web` URL mapping
//! - [`error`] - OAuth 2.0 error representation
//! - [`oauth`] - Protocol types, sessions and token records
//! - [`pe`] - Presentation Exchange definitions and submission matching
//! - [`vc`] - Verifiable presentation and credential accessors
//! - [`storage`] - Namespaced, expiring session storage
//! - [`provider`] - Collaborator traits
//! - [`openid4vp`] - The authorization flows
//! - [`client`] - Outbound HTTP calls to remote nodes
//! - [`http`] - Axum handlers

pub mod client;
pub mod config;
pub mod did;
pub mod error;
pub mod http;
pub mod oauth;
pub mod openid4vp;
pub mod pe;
pub mod provider;
pub mod storage;
pub mod vc;

pub use client::{ClientError, IamHttpClient, OpenId4VpClient};
pub use config::{AuthConfig, ConfigError};
pub use did::{Did, DidError};
pub use error::{ErrorCode, OAuth2Error};
pub use http::{IamState, router};
pub use openid4vp::{AuthorizationResponse, Collaborators, OpenId4VpService};
pub use storage::{InMemorySessionDatabase, SessionDatabase, SessionStore, StoreError};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use didgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{ClientError, IamHttpClient, OpenId4VpClient};
    pub use crate::config::{AuthConfig, ClientConfig, ConfigError, OAuthConfig};
    pub use crate::did::{Did, DidError};
    pub use crate::error::{ErrorCode, OAuth2Error};
    pub use crate::http::{IamState, router};
    pub use crate::oauth::{
        AccessToken, AuthorizationServerMetadata, OAuthClientMetadata, OAuthSession, TokenRequest,
        TokenResponse,
    };
    pub use crate::openid4vp::{AuthorizationResponse, Collaborators, FlowResult, OpenId4VpService};
    pub use crate::pe::{PresentationDefinition, PresentationSubmission};
    pub use crate::provider::{
        CredentialVerifier, DocumentOwner, HolderRole, PolicyBackend, ProviderError, VerifierRole,
        Wallet,
    };
    pub use crate::storage::{InMemorySessionDatabase, SessionDatabase, SessionStore, StoreError};
    pub use crate::vc::{VerifiableCredential, VerifiablePresentation};
}

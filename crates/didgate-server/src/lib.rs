//! # didgate-server
//!
//! Assembles the HTTP surface of a didgate node: configuration, tracing,
//! the session database and the router serving the OpenID4VP endpoints of
//! owned identifiers.
//!
//! Collaborators (credential verification, wallet, identifier ownership)
//! are supplied by the embedding process through [`Collaborators`].

pub mod config;
pub mod observability;
pub mod policy;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use didgate_auth::config::ConfigError;
use didgate_auth::http::{IamState, router};
use didgate_auth::openid4vp::{Collaborators, OpenId4VpService};
use didgate_auth::storage::InMemorySessionDatabase;
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use policy::{FilePolicyBackend, PolicyError};

/// Interval of the expired-session sweep.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),
}

/// A built node: the router plus the handles it depends on.
pub struct Node {
    pub router: Router,
    pub service: Arc<OpenId4VpService>,
    pub sessions: InMemorySessionDatabase,
    cleanup: tokio::task::JoinHandle<()>,
}

impl Drop for Node {
    fn drop(&mut self) {
        self.cleanup.abort();
    }
}

/// Builds the policy backend named by `cfg.policy`.
pub fn load_policy(cfg: &AppConfig) -> Result<FilePolicyBackend, PolicyError> {
    match &cfg.policy.directory {
        Some(dir) => FilePolicyBackend::load(dir),
        None => {
            tracing::warn!("No policy directory configured; every scope is unsupported");
            Ok(FilePolicyBackend::default())
        }
    }
}

/// Builds the node. Must be called within a Tokio runtime.
pub fn build_node(cfg: &AppConfig, collaborators: Collaborators) -> Result<Node, ServerError> {
    let sessions = InMemorySessionDatabase::new();
    let service = Arc::new(OpenId4VpService::new(
        collaborators,
        Arc::new(sessions.clone()),
        cfg.auth.clone(),
    )?);
    let cleanup = sessions.start_cleanup_task(SESSION_CLEANUP_INTERVAL);
    let router = router(IamState::new(Arc::clone(&service))).layer(TraceLayer::new_for_http());

    tracing::info!(public_url = %cfg.auth.public_url, "Node assembled");
    Ok(Node {
        router,
        service,
        sessions,
        cleanup,
    })
}

//! Ephemeral session storage.
//!
//! Protocol state (nonces, client state, authorization codes, access
//! tokens) lives in a [`SessionDatabase`]. The database is created once at
//! startup and shared; components work through typed, namespaced
//! [`SessionStore`] views that carry the TTL of their namespace.
//!
//! # Namespaces
//!
//! Every namespace is partitioned by the owning identifier so a
//! multi-tenant node never mixes state of two tenants:
//!
//! - `oauth/nonce/{owner}`
//! - `oauth/client_state/{owner}`
//! - `oauth/code/{owner}`
//! - `oauth/access_token/{owner}`
//!
//! # Security Considerations
//!
//! - Keys are generated by the caller from a secure random source
//! - A missing and an expired key are indistinguishable (`NotFound`)
//! - [`SessionStore::take`] must be atomic so that a value can be claimed
//!   by exactly one caller

pub mod memory;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::did::Did;

pub use memory::InMemorySessionDatabase;

/// Session storage errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The key does not exist or has expired.
    #[error("session not found")]
    NotFound,

    /// The value could not be (de)serialized.
    #[error("session serialization failed: {0}")]
    Serialization(String),

    /// The backend failed.
    #[error("session backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Identifies a partition of the session database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Builds a namespace from its path segments.
    #[must_use]
    pub fn new<S: AsRef<str>>(segments: &[S]) -> Self {
        let parts: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
        Self(parts.join("/"))
    }

    /// Nonces minted for holder-initiated authorization requests.
    #[must_use]
    pub fn nonce(owner: &Did) -> Self {
        Self::new(&["oauth", "nonce", &owner.to_string()])
    }

    /// Client state values of holder-initiated authorization requests.
    #[must_use]
    pub fn client_state(owner: &Did) -> Self {
        Self::new(&["oauth", "client_state", &owner.to_string()])
    }

    /// Authorization codes.
    #[must_use]
    pub fn code(owner: &Did) -> Self {
        Self::new(&["oauth", "code", &owner.to_string()])
    }

    /// Issued access tokens.
    #[must_use]
    pub fn access_token(owner: &Did) -> Self {
        Self::new(&["oauth", "access_token", &owner.to_string()])
    }

    /// Namespace path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend for namespaced, TTL-bound JSON values.
///
/// Implementations must be safe for uncoordinated concurrent callers.
#[async_trait]
pub trait SessionDatabase: Send + Sync {
    /// Stores `value` under `key`, replacing any existing value. The entry
    /// expires `ttl` after this call.
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Reads the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for missing or expired keys.
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<serde_json::Value, StoreError>;

    /// Deletes `key`. Deleting a missing key is not an error.
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    /// Atomically reads and deletes `key`.
    ///
    /// Of several concurrent callers for the same key at most one receives
    /// the value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for missing or expired keys.
    async fn take(&self, namespace: &Namespace, key: &str)
    -> Result<serde_json::Value, StoreError>;
}

/// Typed view on one namespace of a [`SessionDatabase`].
pub struct SessionStore<T> {
    db: Arc<dyn SessionDatabase>,
    namespace: Namespace,
    ttl: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            namespace: self.namespace.clone(),
            ttl: self.ttl,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SessionStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<T> SessionStore<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    /// Creates a view on `namespace` whose entries live for `ttl`.
    pub fn new(db: Arc<dyn SessionDatabase>, namespace: Namespace, ttl: Duration) -> Self {
        Self {
            db,
            namespace,
            ttl,
            _marker: PhantomData,
        }
    }

    /// Namespace of this view.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Stores `value` under `key` with the namespace TTL.
    pub async fn put(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw =
            serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db.put(&self.namespace, key, raw, self.ttl).await
    }

    /// Reads the value under `key`.
    pub async fn get(&self, key: &str) -> Result<T, StoreError> {
        let raw = self.db.get(&self.namespace, key).await?;
        serde_json::from_value(raw).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deletes `key`.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db.delete(&self.namespace, key).await
    }

    /// Atomically reads and deletes `key`.
    pub async fn take(&self, key: &str) -> Result<T, StoreError> {
        let raw = self.db.take(&self.namespace, key).await?;
        serde_json::from_value(raw).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

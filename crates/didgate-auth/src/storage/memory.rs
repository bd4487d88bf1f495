//! In-memory session database backed by `DashMap`.
//!
//! Suitable for single-instance deployments. Expired entries are treated as
//! absent on access and removed by [`InMemorySessionDatabase::cleanup_expired`],
//! which [`InMemorySessionDatabase::start_cleanup_task`] runs periodically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Namespace, SessionDatabase, StoreError};

/// A stored value with TTL.
#[derive(Clone, Debug)]
struct StoredEntry {
    value: serde_json::Value,
    stored_at: Instant,
    ttl: Duration,
}

impl StoredEntry {
    fn new(value: serde_json::Value, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

type EntryKey = (Namespace, String);

/// Process-local [`SessionDatabase`].
#[derive(Clone, Default)]
pub struct InMemorySessionDatabase {
    entries: Arc<DashMap<EntryKey, StoredEntry>>,
}

impl InMemorySessionDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawns a task that calls [`Self::cleanup_expired`] every `period`.
    pub fn start_cleanup_task(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let db = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let removed = db.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed = removed, "Session cleanup completed");
                }
            }
        })
    }

    fn entry_key(namespace: &Namespace, key: &str) -> EntryKey {
        (namespace.clone(), key.to_string())
    }
}

#[async_trait]
impl SessionDatabase for InMemorySessionDatabase {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries
            .insert(Self::entry_key(namespace, key), StoredEntry::new(value, ttl));
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<serde_json::Value, StoreError> {
        let entry_key = Self::entry_key(namespace, key);
        if let Some(entry) = self.entries.get(&entry_key) {
            if !entry.is_expired() {
                return Ok(entry.value.clone());
            }
            drop(entry);
            self.entries
                .remove_if(&entry_key, |_, entry| entry.is_expired());
        }
        Err(StoreError::NotFound)
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError> {
        self.entries.remove(&Self::entry_key(namespace, key));
        Ok(())
    }

    async fn take(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<serde_json::Value, StoreError> {
        match self.entries.remove(&Self::entry_key(namespace, key)) {
            Some((_, entry)) if !entry.is_expired() => Ok(entry.value),
            _ => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ns() -> Namespace {
        Namespace::new(&["oauth", "nonce", "did:web:node.example"])
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let db = InMemorySessionDatabase::new();
        db.put(&ns(), "a", json!({"x": 1}), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(db.get(&ns(), "a").await.unwrap(), json!({"x": 1}));
        db.delete(&ns(), "a").await.unwrap();
        assert_eq!(db.get(&ns(), "a").await, Err(StoreError::NotFound));

        // deleting twice is fine
        db.delete(&ns(), "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_found() {
        let db = InMemorySessionDatabase::new();
        db.put(&ns(), "a", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(db.get(&ns(), "a").await, Err(StoreError::NotFound));
        assert_eq!(db.take(&ns(), "a").await, Err(StoreError::NotFound));
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let db = InMemorySessionDatabase::new();
        db.put(&ns(), "short", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        db.put(&ns(), "long", json!(2), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(db.cleanup_expired(), 1);
        assert_eq!(db.len(), 1);
        assert_eq!(db.get(&ns(), "long").await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_concurrent_take_has_single_winner() {
        let db = InMemorySessionDatabase::new();
        db.put(&ns(), "code", json!("session"), Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.take(&ns(), "code").await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

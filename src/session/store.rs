//! Session storage capability and the in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::db::StoreError;

/// Persisted state of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage backend for sessions.
///
/// Implementations must be safe for concurrent use; the pipeline shares one
/// instance across all in-flight requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session. Expired sessions are reported as absent.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Insert or replace a session.
    async fn save(&self, id: &str, record: SessionRecord) -> Result<(), StoreError>;

    async fn destroy(&self, id: &str) -> Result<(), StoreError>;

    /// Remove every expired session, returning how many were removed.
    async fn sweep(&self) -> Result<usize, StoreError>;
}

/// Process-local store. Sessions do not survive a restart and are not
/// shared between instances.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let record = self.sessions.get(id).map(|r| r.value().clone());
        Ok(record.filter(|r| !r.is_expired(Utc::now())))
    }

    async fn save(&self, id: &str, record: SessionRecord) -> Result<(), StoreError> {
        self.sessions.insert(id.to_string(), record);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn sweep(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.sessions.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(offset_secs: i64) -> SessionRecord {
        SessionRecord {
            data: Map::new(),
            expires_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn test_save_load_destroy() {
        let store = MemorySessionStore::new();
        store.save("a", record(60)).await.unwrap();
        assert!(store.load("a").await.unwrap().is_some());

        store.destroy("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_is_absent() {
        let store = MemorySessionStore::new();
        store.save("old", record(-1)).await.unwrap();
        assert!(store.load("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = MemorySessionStore::new();
        store.save("old", record(-10)).await.unwrap();
        store.save("older", record(-100)).await.unwrap();
        store.save("live", record(600)).await.unwrap();

        assert_eq!(store.sweep().await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.load("live").await.unwrap().is_some());
    }
}

//! Concurrent session-to-upstream-client storage.
//!
//! [`SessionStore`] maps each session id to its live [`DerivClient`].
//! Invariant: at most one upstream socket per session; binding a new
//! client for a session closes the previous one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::SessionId;
use crate::deriv::DerivClient;

/// Central in-memory store for all active sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<DerivClient>>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client bound to a session, if any.
    pub async fn get(&self, session_id: SessionId) -> Option<Arc<DerivClient>> {
        let map = self.sessions.read().await;
        map.get(&session_id).cloned()
    }

    /// Binds a client to a session, closing any previous client.
    pub async fn insert(&self, session_id: SessionId, client: Arc<DerivClient>) {
        let mut map = self.sessions.write().await;
        if let Some(existing) = map.insert(session_id, client) {
            existing.close();
        }
    }

    /// Removes a session, closing its client. Returns `true` if the
    /// session existed.
    pub async fn remove(&self, session_id: SessionId) -> bool {
        let mut map = self.sessions.write().await;
        match map.remove(&session_id) {
            Some(client) => {
                client.close();
                true
            }
            None => false,
        }
    }

    /// Returns the number of active sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::deriv::UpstreamConfig;

    fn test_client() -> Arc<DerivClient> {
        // Dialing is lazy, so no network I/O happens here.
        Arc::new(DerivClient::spawn(
            UpstreamConfig {
                url: "ws://127.0.0.1:9/never".to_string(),
                token: "t".to_string(),
                stream_buffer_size: 4,
            },
            Duration::from_millis(100),
        ))
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = SessionStore::new();
        let id = SessionId::new();
        assert!(store.get(id).await.is_none());

        store.insert(id, test_client()).await;
        assert!(store.get(id).await.is_some());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn insert_replaces_existing() {
        let store = SessionStore::new();
        let id = SessionId::new();

        store.insert(id, test_client()).await;
        let first = store.get(id).await;
        store.insert(id, test_client()).await;
        let second = store.get(id).await;

        let (Some(first), Some(second)) = (first, second) else {
            panic!("both clients should exist");
        };
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn remove_closes_and_deletes() {
        let store = SessionStore::new();
        let id = SessionId::new();

        store.insert(id, test_client()).await;
        assert!(store.remove(id).await);
        assert!(store.get(id).await.is_none());
        assert!(!store.remove(id).await);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = SessionStore::new();
        let a = SessionId::new();
        let b = SessionId::new();

        store.insert(a, test_client()).await;
        store.insert(b, test_client()).await;
        assert_eq!(store.count().await, 2);

        store.remove(a).await;
        assert!(store.get(b).await.is_some());
    }
}

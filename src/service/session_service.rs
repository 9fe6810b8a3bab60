//! Session service: orchestrates login, logout, and client lookup.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::deriv::{DerivClient, UpstreamConfig};
use crate::error::GatewayError;
use crate::session::{SessionId, SessionStore};

/// Orchestration layer for session lifecycle.
///
/// Owns the [`SessionStore`] and builds one [`DerivClient`] per login,
/// configured from [`GatewayConfig`]. Every mutation follows the pattern:
/// build client → swap into store (closing the old one) → log.
#[derive(Debug)]
pub struct SessionService {
    store: SessionStore,
    upstream_url: String,
    call_timeout: Duration,
    stream_buffer_size: usize,
}

impl SessionService {
    /// Creates a new `SessionService` from the gateway configuration.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            store: SessionStore::new(),
            upstream_url: config.upstream_url(),
            call_timeout: config.call_timeout(),
            stream_buffer_size: config.stream_buffer_size,
        }
    }

    /// Binds a fresh upstream client for `token` to the session,
    /// replacing (and closing) any existing client.
    pub async fn login(&self, session_id: SessionId, token: String) {
        let client = DerivClient::spawn(
            UpstreamConfig {
                url: self.upstream_url.clone(),
                token,
                stream_buffer_size: self.stream_buffer_size,
            },
            self.call_timeout,
        );
        self.store.insert(session_id, Arc::new(client)).await;
        tracing::info!(%session_id, "session logged in");
    }

    /// Closes and removes the session's client, if any.
    pub async fn logout(&self, session_id: SessionId) {
        if self.store.remove(session_id).await {
            tracing::info!(%session_id, "session logged out");
        }
    }

    /// Returns the live client for a session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotAuthenticated`] when the session has no
    /// bound client (never logged in, or logged out).
    pub async fn client(&self, session_id: SessionId) -> Result<Arc<DerivClient>, GatewayError> {
        self.store
            .get(session_id)
            .await
            .ok_or(GatewayError::NotAuthenticated)
    }

    /// Number of sessions with a live client.
    pub async fn session_count(&self) -> usize {
        self.store.count().await
    }
}

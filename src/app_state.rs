//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::config::GatewayConfig;
use crate::service::SessionService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session lifecycle and upstream client lookup.
    pub session_service: Arc<SessionService>,
    /// Per-IP request limiter for the `/api` surface.
    pub rate_limiter: Arc<RateLimiter>,
    /// Gateway configuration loaded at startup.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Builds the full application state from configuration.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            session_service: Arc::new(SessionService::new(&config)),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window(),
            )),
            config: Arc::new(config),
        }
    }
}

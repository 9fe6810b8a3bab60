//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default so the
//! gateway starts with no configuration at all.

use std::net::SocketAddr;
use std::time::Duration;

/// Default Deriv application id used when `DERIV_APP_ID` is not set.
pub const DEFAULT_APP_ID: u32 = 80342;

/// Default upstream WebSocket endpoint (without the `app_id` query).
pub const DEFAULT_WS_URL: &str = "wss://ws.derivws.com/websockets/v3";

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Deriv application id appended to the upstream URL.
    pub deriv_app_id: u32,

    /// Upstream WebSocket base URL.
    pub deriv_ws_url: String,

    /// HMAC key for signing the session cookie.
    pub session_secret: String,

    /// Session cookie lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Maximum requests per rate-limit window per client IP.
    pub rate_limit_max_requests: u32,

    /// Rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Timeout in seconds for a single proxied upstream call.
    pub upstream_call_timeout_secs: u64,

    /// Buffer size of the per-subscription tick channel.
    pub stream_buffer_size: usize,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// When `SESSION_SECRET` is absent a random per-process secret is
    /// generated; sessions then do not survive a restart, which matches
    /// the in-memory session store anyway.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let deriv_app_id = parse_env("DERIV_APP_ID", DEFAULT_APP_ID);
        let deriv_ws_url =
            std::env::var("DERIV_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());

        let session_secret = match std::env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("SESSION_SECRET not set; using a random per-process secret");
                uuid::Uuid::new_v4().to_string()
            }
        };

        let session_ttl_secs = parse_env("SESSION_TTL_SECS", 8 * 60 * 60);
        let rate_limit_max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", 300);
        let rate_limit_window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", 15 * 60);
        let upstream_call_timeout_secs = parse_env("UPSTREAM_CALL_TIMEOUT_SECS", 30);
        let stream_buffer_size = parse_env("STREAM_BUFFER_SIZE", 64);

        Ok(Self {
            listen_addr,
            deriv_app_id,
            deriv_ws_url,
            session_secret,
            session_ttl_secs,
            rate_limit_max_requests,
            rate_limit_window_secs,
            upstream_call_timeout_secs,
            stream_buffer_size,
        })
    }

    /// Full upstream URL including the `app_id` query parameter.
    ///
    /// A path-less base URL gains a root path; the WebSocket handshake
    /// requires a path component in the request URI.
    #[must_use]
    pub fn upstream_url(&self) -> String {
        let has_path = self
            .deriv_ws_url
            .split_once("://")
            .is_some_and(|(_, rest)| rest.contains('/'));
        if has_path {
            format!("{}?app_id={}", self.deriv_ws_url, self.deriv_app_id)
        } else {
            format!("{}/?app_id={}", self.deriv_ws_url, self.deriv_app_id)
        }
    }

    /// Upstream call timeout as a [`Duration`].
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_call_timeout_secs)
    }

    /// Rate-limit window as a [`Duration`].
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

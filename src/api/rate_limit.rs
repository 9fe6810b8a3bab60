//! Fixed-window rate limiting for the `/api` surface.
//!
//! Counts requests per client IP in fixed windows (default 300 requests
//! per 15 minutes). Over-limit requests are rejected with
//! [`GatewayError::RateLimited`] carrying the remaining window time.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::RwLock;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Per-IP fixed-window request counter.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: RwLock<HashMap<IpAddr, Window>>,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window` per IP.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Records one request for `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] when the IP has exhausted
    /// its window, with `retry_after_ms` set to the window remainder.
    pub async fn check(&self, ip: IpAddr) -> Result<(), GatewayError> {
        let now = Instant::now();
        let mut map = self.windows.write().await;

        // Expired windows are cleared on the way through.
        map.retain(|_, w| now.duration_since(w.started) < self.window);

        let window = map.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if window.count >= self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(window.started));
            return Err(GatewayError::RateLimited {
                retry_after_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            });
        }
        window.count += 1;
        Ok(())
    }
}

/// Axum middleware applying the limiter to every request it wraps.
///
/// # Errors
///
/// Returns [`GatewayError::RateLimited`] when the client is over limit.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let ip = client_ip(req.headers(), addr);
    state.rate_limiter.check(ip).await?;
    Ok(next.run(req).await)
}

/// Resolves the client IP, honoring `X-Forwarded-For` from a fronting
/// proxy and falling back to the socket address.
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| addr.ip())
}

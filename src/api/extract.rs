//! Request extractors for authenticated sessions.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::deriv::DerivClient;
use crate::error::GatewayError;
use crate::session::{SessionId, cookie};

/// The authenticated session behind the current request.
///
/// Extraction verifies the signed `sid` cookie and resolves the live
/// upstream client. Rejects with 401 when the cookie is missing, has a
/// bad signature, or the session has no bound client.
#[derive(Debug)]
pub struct CurrentSession {
    /// Verified session id from the cookie.
    pub session_id: SessionId,
    /// The session's upstream client.
    pub client: Arc<DerivClient>,
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = session_from_headers(&parts.headers, &state.config.session_secret)
            .ok_or(GatewayError::NotAuthenticated)?;
        let client = state.session_service.client(session_id).await?;
        Ok(Self { session_id, client })
    }
}

/// Extracts a verified session id from a `Cookie` header, without
/// requiring a bound client (login reuses an existing session this way).
#[must_use]
pub fn session_from_headers(headers: &HeaderMap, secret: &str) -> Option<SessionId> {
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|header| cookie::from_cookie_header(header, secret))
}

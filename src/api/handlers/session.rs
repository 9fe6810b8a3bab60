//! Session handlers: login and logout.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{AckResponse, LoginRequest};
use crate::api::extract::session_from_headers;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::session::{SessionId, cookie};

/// `POST /api/login` — Bind a Deriv API token to the browser session.
///
/// Reuses the session id from a valid `sid` cookie when present,
/// otherwise issues a fresh one. Any previous upstream client for the
/// session is closed and replaced.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the token is missing.
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Session",
    summary = "Log in with a Deriv API token",
    description = "Issues (or reuses) the signed session cookie and binds a fresh upstream client authorized with the given token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = AckResponse),
        (status = 400, description = "Missing token", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let token = req.token.unwrap_or_default();
    if token.trim().is_empty() {
        return Err(GatewayError::InvalidRequest("missing token".to_string()));
    }

    let session_id = session_from_headers(&headers, &state.config.session_secret)
        .unwrap_or_else(SessionId::new);
    state.session_service.login(session_id, token).await;

    let set_cookie = cookie::set_cookie_header(
        session_id,
        &state.config.session_secret,
        state.config.session_ttl_secs,
    );
    Ok(([(SET_COOKIE, set_cookie)], Json(AckResponse::ok())))
}

/// `POST /api/logout` — Close the session's upstream client and clear
/// the cookie.
///
/// Idempotent: succeeds even without a valid session.
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "Session",
    summary = "Log out",
    description = "Closes the upstream connection bound to the session and clears the session cookie.",
    responses(
        (status = 200, description = "Session cleared", body = AckResponse),
    )
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(session_id) = session_from_headers(&headers, &state.config.session_secret) {
        state.session_service.logout(session_id).await;
    }
    (
        [(SET_COOKIE, cookie::clear_cookie_header())],
        Json(AckResponse::ok()),
    )
}

/// Session routes mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

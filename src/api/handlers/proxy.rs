//! Generic Deriv call proxy.

use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::api::extract::CurrentSession;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /api/deriv` — Forward an arbitrary request to the Deriv API.
///
/// The body is passed upstream verbatim (plus a correlation id) over the
/// session's socket, and the correlated response comes back verbatim.
///
/// # Errors
///
/// - [`GatewayError::NotAuthenticated`] without a valid session.
/// - [`GatewayError::Upstream`] when the vendor rejects the request.
/// - [`GatewayError::CallTimeout`] / [`GatewayError::UpstreamClosed`] on
///   transport failures.
#[utoipa::path(
    post,
    path = "/api/deriv",
    tag = "Proxy",
    summary = "Proxy a raw Deriv API call",
    description = "Forwards the JSON body to the Deriv WebSocket API over the session's connection and returns the correlated response.",
    responses(
        (status = 200, description = "Upstream response"),
        (status = 400, description = "Invalid request or vendor error", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    )
)]
pub async fn deriv_call(
    session: CurrentSession,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, GatewayError> {
    let response = session.client.call(payload).await?;
    Ok(Json(response))
}

/// Proxy routes mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/deriv", post(deriv_call))
}

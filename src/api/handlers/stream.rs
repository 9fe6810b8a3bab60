//! SSE streaming handlers bridging upstream subscriptions.

use std::convert::Infallible;

use axum::extract::Query;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::{Stream, StreamExt};

use crate::api::dto::TickStreamParams;
use crate::api::extract::CurrentSession;
use crate::app_state::AppState;
use crate::deriv::messages;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /api/stream/ticks?symbol=S` — Stream tick messages as SSE.
///
/// Subscribes `{"ticks": S, "subscribe": 1}` on the session's upstream
/// connection and forwards every stream message as one SSE `data` event.
/// Closing the HTTP response drops the stream, which forgets the
/// subscription upstream.
///
/// # Errors
///
/// - [`GatewayError::InvalidRequest`] when `symbol` is empty.
/// - [`GatewayError::NotAuthenticated`] without a valid session.
/// - [`GatewayError::UpstreamClosed`] if the connection task is gone.
#[utoipa::path(
    get,
    path = "/api/stream/ticks",
    tag = "Streams",
    summary = "Stream ticks for a symbol",
    description = "Server-Sent Events stream of upstream tick messages for the given symbol, one JSON message per event.",
    params(TickStreamParams),
    responses(
        (status = 200, description = "SSE stream of tick messages"),
        (status = 400, description = "Missing symbol", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    )
)]
pub async fn stream_ticks(
    session: CurrentSession,
    Query(params): Query<TickStreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, GatewayError> {
    if params.symbol.trim().is_empty() {
        return Err(GatewayError::InvalidRequest("missing symbol".to_string()));
    }

    let ticks = session
        .client
        .subscribe(messages::ticks_request(&params.symbol))
        .await?;
    tracing::debug!(session_id = %session.session_id, symbol = %params.symbol, "tick stream opened");

    let stream = ticks.map(|value| Ok(Event::default().data(value.to_string())));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Streaming routes mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/stream/ticks", get(stream_ticks))
}

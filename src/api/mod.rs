//! REST API layer: route handlers, DTOs, extractors, and router
//! composition.
//!
//! Session-facing endpoints are mounted under `/api` and rate limited;
//! system endpoints live at the root. With the default `swagger-ui`
//! feature the OpenAPI document is served at `/api-docs/openapi.json`
//! with the UI at `/swagger-ui`.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod rate_limit;

use axum::Router;
use axum::middleware;
use utoipa::OpenApi;
#[cfg(feature = "swagger-ui")]
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

/// OpenAPI document covering the whole REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::session::login,
        handlers::session::logout,
        handlers::proxy::deriv_call,
        handlers::stream::stream_ticks,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::LoginRequest,
        dto::AckResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "Session", description = "Login and logout"),
        (name = "Proxy", description = "Raw Deriv API passthrough"),
        (name = "Streams", description = "SSE market data streams"),
        (name = "System", description = "Health and diagnostics"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router, with the fixed-window rate limiter
/// applied to everything under `/api`.
pub fn build_router(state: &AppState) -> Router<AppState> {
    let api = handlers::routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::rate_limit_middleware,
    ));

    let router = Router::new()
        .nest("/api", api)
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

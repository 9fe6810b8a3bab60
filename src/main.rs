//! deriv-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and SSE endpoints.

use std::net::SocketAddr;

use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use deriv_gateway::api;
use deriv_gateway::app_state::AppState;
use deriv_gateway::config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    let listen_addr = config.listen_addr;
    tracing::info!(addr = %listen_addr, upstream = %config.upstream_url(), "starting deriv-gateway");

    // Build application state
    let state = AppState::new(config);

    // Credentialed CORS: reflect the caller's origin so the browser
    // sends the session cookie cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    // Build router
    let app = api::build_router(&state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start server; ConnectInfo feeds the rate limiter's client IPs.
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

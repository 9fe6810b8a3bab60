//! DTOs for the SSE streaming endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters for the tick stream endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TickStreamParams {
    /// Instrument symbol to stream (e.g. `R_100`).
    pub symbol: String,
}

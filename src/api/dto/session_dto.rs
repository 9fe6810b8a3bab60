//! DTOs for the login/logout endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Login request carrying the user's Deriv API token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Deriv API token, scoped read or trade as the user prefers.
    /// Optional at the wire level so an absent field answers 400
    /// instead of a deserialization rejection.
    #[serde(default)]
    pub token: Option<String>,
}

/// Plain acknowledgement response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AckResponse {
    /// Always `true` on success.
    pub ok: bool,
}

impl AckResponse {
    /// The affirmative acknowledgement.
    #[must_use]
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

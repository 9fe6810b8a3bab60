//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "not authenticated",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details. For upstream errors this carries the
    /// vendor's own error code string (e.g. `"InvalidToken"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category       | HTTP Status                |
/// |-----------|----------------|----------------------------|
/// | 1000–1999 | Validation     | 400 Bad Request            |
/// | 2000–2999 | Session/Auth   | 401 Unauthorized           |
/// | 3000–3999 | Server         | 500 Internal Server Error  |
/// | 4000–4999 | Upstream       | 400 / 502 / 504            |
///
/// Rate limiting reuses the literal HTTP code `429` as its error code.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No valid session cookie, or the session has no live upstream client.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Error object returned by the Deriv API for a proxied call.
    #[error("upstream error [{code}]: {message}")]
    Upstream {
        /// Vendor error code string (e.g. `"InvalidToken"`).
        code: String,
        /// Vendor error message.
        message: String,
    },

    /// The upstream socket closed before the response arrived.
    #[error("upstream connection closed")]
    UpstreamClosed,

    /// The upstream did not answer within the configured call timeout.
    #[error("upstream call timed out")]
    CallTimeout,

    /// Client exceeded rate limit.
    #[error("rate limit exceeded; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the client may retry.
        retry_after_ms: u64,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotAuthenticated => 2001,
            Self::Upstream { .. } => 4001,
            Self::UpstreamClosed => 4002,
            Self::CallTimeout => 4003,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // Vendor errors surface as 400, mirroring the proxy contract.
            Self::InvalidRequest(_) | Self::Upstream { .. } => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::UpstreamClosed => StatusCode::BAD_GATEWAY,
            Self::CallTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::Upstream { code, .. } => Some(code.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::NotAuthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::UpstreamClosed.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::CallTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::RateLimited { retry_after_ms: 1 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn upstream_error_keeps_vendor_code() {
        let err = GatewayError::Upstream {
            code: "InvalidToken".to_string(),
            message: "the token is invalid".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("InvalidToken"));
    }
}

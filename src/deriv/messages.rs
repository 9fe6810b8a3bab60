//! Upstream message envelope and outbound request helpers.
//!
//! The Deriv API speaks free-form JSON; the gateway only needs the
//! correlation and routing fields (`msg_type`, `req_id`, `error`,
//! `subscription`) and otherwise forwards messages untouched.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::GatewayError;

/// `msg_type` of the authorization response.
pub const MSG_TYPE_AUTHORIZE: &str = "authorize";

/// Error object attached to failed upstream responses.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamError {
    /// Vendor error code string (e.g. `"InvalidToken"`).
    pub code: String,
    /// Vendor error message.
    pub message: String,
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream {
            code: err.code,
            message: err.message,
        }
    }
}

/// Subscription metadata carried on stream messages.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionInfo {
    /// Upstream subscription id, used for `forget`.
    pub id: String,
}

/// Correlation and routing fields of an upstream message.
///
/// Every field is optional; the vendor omits whichever do not apply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    /// Response type discriminator (`"authorize"`, `"tick"`, ...).
    #[serde(default)]
    pub msg_type: Option<String>,
    /// Echoed request correlation id.
    #[serde(default)]
    pub req_id: Option<u64>,
    /// Error object, present when the request failed.
    #[serde(default)]
    pub error: Option<UpstreamError>,
    /// Subscription metadata, present on stream messages.
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
}

/// A parsed upstream message: routing envelope plus the full JSON value
/// that gets forwarded to downstream clients verbatim.
#[derive(Debug, Clone)]
pub struct UpstreamMessage {
    /// Routing fields extracted from the payload.
    pub envelope: Envelope,
    /// The complete message as received.
    pub value: Value,
}

impl UpstreamMessage {
    /// Parses a raw upstream text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the frame is not valid JSON.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        let envelope = Envelope::deserialize(&value)?;
        Ok(Self { envelope, value })
    }
}

/// Injects a `req_id` correlation field into an outbound request.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the payload is not a JSON
/// object (the vendor accepts nothing else).
pub fn with_req_id(payload: Value, req_id: u64) -> Result<Value, GatewayError> {
    match payload {
        Value::Object(mut map) => {
            map.insert("req_id".to_string(), Value::from(req_id));
            Ok(Value::Object(map))
        }
        _ => Err(GatewayError::InvalidRequest(
            "request body must be a JSON object".to_string(),
        )),
    }
}

/// Builds the authorization request sent immediately after connect.
#[must_use]
pub fn authorize_request(token: &str, req_id: u64) -> Value {
    json!({ "authorize": token, "req_id": req_id })
}

/// Builds a `forget` request for an upstream subscription id.
#[must_use]
pub fn forget_request(subscription_id: &str, req_id: u64) -> Value {
    json!({ "forget": subscription_id, "req_id": req_id })
}

/// Builds a tick subscription request for a symbol.
#[must_use]
pub fn ticks_request(symbol: &str) -> Value {
    json!({ "ticks": symbol, "subscribe": 1 })
}

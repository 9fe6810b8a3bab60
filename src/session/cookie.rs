//! Signed session cookie encoding and verification.
//!
//! The `sid` cookie value is `<uuid>.<hex hmac>` where the signature is
//! HMAC-SHA256 over the UUID string keyed with `SESSION_SECRET`. A cookie
//! with a missing or wrong signature is treated as absent.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::SessionId;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "sid";

/// Signs a session id into a cookie value (`<uuid>.<hex hmac>`).
#[must_use]
pub fn sign(session_id: SessionId, secret: &str) -> String {
    format!("{session_id}.{}", mac_hex(&session_id.to_string(), secret))
}

/// Verifies a cookie value and extracts the session id.
///
/// Returns `None` for malformed values, non-UUID session ids, or
/// signature mismatches. Uses the constant-time comparison provided by
/// the `hmac` crate.
#[must_use]
pub fn verify(value: &str, secret: &str) -> Option<SessionId> {
    let (id_part, sig_part) = value.split_once('.')?;
    let session_id: SessionId = id_part.parse().ok()?;

    let sig_bytes = hex::decode(sig_part).ok()?;
    let mac = mac_for(id_part, secret);
    mac.verify_slice(&sig_bytes).ok()?;

    Some(session_id)
}

/// Builds a `Set-Cookie` header value for the given session id.
///
/// HttpOnly and SameSite=Lax, matching browser-dashboard usage. `Secure`
/// is intentionally omitted; a TLS-terminating proxy in front of the
/// gateway should add it.
#[must_use]
pub fn set_cookie_header(session_id: SessionId, secret: &str, max_age_secs: u64) -> String {
    format!(
        "{COOKIE_NAME}={}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax",
        sign(session_id, secret)
    )
}

/// Builds a `Set-Cookie` header value that clears the session cookie.
#[must_use]
pub fn clear_cookie_header() -> String {
    format!("{COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// Extracts and verifies the session id from a `Cookie` header value.
#[must_use]
pub fn from_cookie_header(header: &str, secret: &str) -> Option<SessionId> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .and_then(|(_, value)| verify(value, secret))
}

fn mac_for(data: &str, secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so new_from_slice cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(data.as_bytes());
    mac
}

fn mac_hex(data: &str, secret: &str) -> String {
    hex::encode(mac_for(data, secret).finalize().into_bytes())
}

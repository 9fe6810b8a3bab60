//! Upstream Deriv WebSocket layer: per-session client, connection task,
//! and message envelope types.
//!
//! One [`DerivClient`] exists per authenticated session. It multiplexes
//! calls and subscription streams over a single upstream socket using the
//! vendor's `req_id` correlation field.

pub mod client;
pub mod connection;
pub mod messages;

pub use client::{DerivClient, TickStream};
pub use connection::UpstreamConfig;

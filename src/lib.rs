//! # deriv-gateway
//!
//! REST and SSE gateway multiplexing browser sessions onto the Deriv
//! trading WebSocket API.
//!
//! Each authenticated session owns one persistent upstream WebSocket,
//! authorized with the user's API token. Requests issued before
//! authorization completes are queued and flushed in order; calls are
//! correlated over the shared socket via the vendor's `req_id` field;
//! subscription streams are forwarded to HTTP clients as Server-Sent
//! Events and forgotten upstream when the client disconnects.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, SSE)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SessionService (service/)
//!     ├── SessionStore (session/)
//!     │
//!     ├── DerivClient — one per session (deriv/)
//!     │
//!     └── Deriv WebSocket API (wss://ws.derivws.com)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod deriv;
pub mod error;
pub mod service;
pub mod session;

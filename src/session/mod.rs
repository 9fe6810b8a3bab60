//! Session layer: identity, signed cookie, and the session store.
//!
//! A session is a browser identified by the signed `sid` cookie, mapped
//! in memory to one live upstream client.

pub mod cookie;
pub mod session_id;
pub mod store;

pub use session_id::SessionId;
pub use store::SessionStore;

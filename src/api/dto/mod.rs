//! Request/response DTO types for the REST surface.

pub mod session_dto;
pub mod stream_dto;

pub use session_dto::{AckResponse, LoginRequest};
pub use stream_dto::TickStreamParams;

//! HTTP API module.
//!
//! Exposes the chat-widget protocol at `/chatkit` (SSE for streaming requests)
//! and the streaming-chat SDK message endpoints.

mod chatkit;
mod error;
mod handlers;
mod messages;
mod routes;
mod state;

pub use chatkit::event_stream;
pub use error::{ApiError, ApiJson, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;

//! Chat-widget protocol: `threads.*` request envelopes in, thread and item
//! events out.

pub mod events;
mod handler;
pub mod request;

pub use events::{ThreadItem, ThreadStreamEvent, ThreadView};
pub use handler::{
    ChatConfig, EMPTY_RESPONSE_FALLBACK, EventStream, Phase, ProtocolHandler, ProtocolResponse,
    RequestRun, TITLE_MAX_CHARS, derive_title,
};
pub use request::{ChatRequest, RequestEnvelope};

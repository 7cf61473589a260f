//! Thread persistence.
//!
//! Threads own ordered messages, messages own ordered parts. Parts are stored
//! one row each through the codec in [`parts`].

mod branch;
mod error;
mod models;
pub mod parts;
mod repository;

pub use branch::BranchEditor;
pub use error::{AGENT_FAILURE_MESSAGE, ChatError, ChatResult};
pub use models::{
    AgentContext, AgentType, ListOptions, Message, MessageRole, NewMessage, NewThread, Thread,
    ThreadOwner, ThreadPage, ThreadUpdate, new_message_id, new_thread_id,
};
pub use parts::{Part, PartRow, ToolState};
pub use repository::ThreadRepository;

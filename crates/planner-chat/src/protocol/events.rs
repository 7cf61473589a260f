//! Outbound events and response bodies of the chat-widget protocol.
//!
//! Timestamps are Unix epoch seconds.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::threads::{Message, MessageRole, Thread};

/// Thread as exposed to the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadView {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub metadata: Map<String, Value>,
}

impl From<&Thread> for ThreadView {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id.clone(),
            title: thread.title.clone(),
            created_at: thread.created_at.timestamp(),
            updated_at: thread.updated_at.timestamp(),
            metadata: thread.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    UserMessage,
    AssistantMessage,
    SystemMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemContent {
    InputText { text: String },
    OutputText { text: String, annotations: Vec<Value> },
}

/// A message as a widget item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadItem {
    pub id: String,
    pub thread_id: String,
    pub created_at: i64,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub content: Vec<ItemContent>,
}

impl From<&Message> for ThreadItem {
    fn from(message: &Message) -> Self {
        let text = message.text();
        let (kind, content) = match message.role {
            MessageRole::User => (ItemKind::UserMessage, ItemContent::InputText { text }),
            MessageRole::Assistant => (
                ItemKind::AssistantMessage,
                ItemContent::OutputText {
                    text,
                    annotations: Vec::new(),
                },
            ),
            MessageRole::System => (ItemKind::SystemMessage, ItemContent::InputText { text }),
        };

        Self {
            id: message.id.clone(),
            thread_id: message.thread_id.clone(),
            created_at: message.created_at.timestamp(),
            kind,
            content: vec![content],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Event sent on a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ThreadStreamEvent {
    #[serde(rename = "thread.created")]
    ThreadCreated { thread: ThreadView },
    #[serde(rename = "thread.item.done")]
    ThreadItemDone { item: ThreadItem },
    #[serde(rename = "error")]
    Error { error: ErrorBody },
}

impl ThreadStreamEvent {
    pub fn thread_created(thread: &Thread) -> Self {
        Self::ThreadCreated {
            thread: thread.into(),
        }
    }

    pub fn item_done(message: &Message) -> Self {
        Self::ThreadItemDone {
            item: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorBody {
                message: message.into(),
            },
        }
    }

    /// The `type` tag of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ThreadCreated { .. } => "thread.created",
            Self::ThreadItemDone { .. } => "thread.item.done",
            Self::Error { .. } => "error",
        }
    }
}

/// Page of items in a thread response.
#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub data: Vec<ThreadItem>,
    pub has_more: bool,
}

/// `threads.get` response.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ThreadView,
    pub items: ItemPage,
}

/// `threads.list` response.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadList {
    pub data: Vec<ThreadView>,
    pub has_more: bool,
}

/// `threads.delete` response.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub success: bool,
}

//! Inbound request envelopes.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::threads::{ChatError, ChatResult};

/// Raw `{type, params, metadata?}` envelope posted by the chat widget.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// User input of a streaming request.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub content: Vec<InputContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputContent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl UserInput {
    /// Text of the first content entry. Blank text is rejected.
    pub fn text(&self) -> ChatResult<String> {
        let text = self
            .content
            .first()
            .and_then(|c| c.text.as_deref())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ChatError::validation(
                "params.input.content",
                "message text is required",
            ));
        }
        Ok(text.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CreateParams {
    input: UserInput,
}

#[derive(Debug, Deserialize)]
struct AddUserMessageParams {
    thread_id: String,
    input: UserInput,
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ThreadIdParams {
    thread_id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    thread_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// A decoded chat request.
#[derive(Debug, Clone)]
pub enum ChatRequest {
    CreateThread {
        text: String,
        metadata: Map<String, Value>,
    },
    AddUserMessage {
        thread_id: String,
        text: String,
    },
    ListThreads {
        limit: Option<i64>,
        offset: Option<i64>,
    },
    GetThread {
        thread_id: String,
    },
    UpdateThread {
        thread_id: String,
        title: Option<String>,
        metadata: Option<Map<String, Value>>,
    },
    DeleteThread {
        thread_id: String,
    },
}

fn params<T: DeserializeOwned>(value: Value) -> ChatResult<T> {
    let value = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| ChatError::validation("params", e.to_string()))
}

fn require_thread_id(thread_id: String) -> ChatResult<String> {
    if thread_id.trim().is_empty() {
        return Err(ChatError::validation("params.thread_id", "must not be empty"));
    }
    Ok(thread_id)
}

impl ChatRequest {
    /// Decode and validate an envelope's params.
    pub fn from_envelope(envelope: RequestEnvelope) -> ChatResult<Self> {
        let request = match envelope.kind.as_str() {
            "threads.create" => {
                let p: CreateParams = params(envelope.params)?;
                ChatRequest::CreateThread {
                    text: p.input.text()?,
                    metadata: envelope.metadata.unwrap_or_default(),
                }
            }
            "threads.add_user_message" => {
                let p: AddUserMessageParams = params(envelope.params)?;
                ChatRequest::AddUserMessage {
                    thread_id: require_thread_id(p.thread_id)?,
                    text: p.input.text()?,
                }
            }
            "threads.list" => {
                let p: ListParams = params(envelope.params)?;
                ChatRequest::ListThreads {
                    limit: p.limit,
                    offset: p.offset,
                }
            }
            "threads.get" | "threads.get_by_id" => {
                let p: ThreadIdParams = params(envelope.params)?;
                ChatRequest::GetThread {
                    thread_id: require_thread_id(p.thread_id)?,
                }
            }
            "threads.update" => {
                let p: UpdateParams = params(envelope.params)?;
                ChatRequest::UpdateThread {
                    thread_id: require_thread_id(p.thread_id)?,
                    title: p.title,
                    metadata: p.metadata,
                }
            }
            "threads.delete" => {
                let p: ThreadIdParams = params(envelope.params)?;
                ChatRequest::DeleteThread {
                    thread_id: require_thread_id(p.thread_id)?,
                }
            }
            other => {
                return Err(ChatError::validation(
                    "type",
                    format!("unsupported request type: {other}"),
                ));
            }
        };
        Ok(request)
    }

    /// Request type name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatRequest::CreateThread { .. } => "threads.create",
            ChatRequest::AddUserMessage { .. } => "threads.add_user_message",
            ChatRequest::ListThreads { .. } => "threads.list",
            ChatRequest::GetThread { .. } => "threads.get",
            ChatRequest::UpdateThread { .. } => "threads.update",
            ChatRequest::DeleteThread { .. } => "threads.delete",
        }
    }

    /// Whether the response is an event stream.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            ChatRequest::CreateThread { .. } | ChatRequest::AddUserMessage { .. }
        )
    }
}

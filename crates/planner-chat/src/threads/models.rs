//! Thread and message models.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use super::error::{ChatError, ChatResult};
use super::parts::Part;
use crate::auth::Role;

/// Generate a new thread id.
pub fn new_thread_id() -> String {
    format!("thr_{}", uuid::Uuid::new_v4().simple())
}

/// Generate a new message id.
pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

pub(crate) fn from_millis(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

/// Agent variant a thread talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Assistant for clients planning an event.
    Client,
    /// Assistant for venue staff, not tied to an event.
    VenueGeneral,
    /// Assistant for venue staff working on a specific event.
    VenueEvent,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Client => "client",
            AgentType::VenueGeneral => "venue_general",
            AgentType::VenueEvent => "venue_event",
        }
    }

    pub fn requires_event(&self) -> bool {
        matches!(self, AgentType::Client | AgentType::VenueEvent)
    }

    pub fn requires_venue(&self) -> bool {
        matches!(self, AgentType::VenueGeneral | AgentType::VenueEvent)
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(AgentType::Client),
            "venue_general" => Ok(AgentType::VenueGeneral),
            "venue_event" => Ok(AgentType::VenueEvent),
            _ => Err(format!("unknown agent type: {}", s)),
        }
    }
}

/// Agent variant plus the event/venue context it operates on.
///
/// Fixed when the thread is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub agent_type: AgentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
}

impl AgentContext {
    /// Build a context, checking that the ids the variant needs are present.
    pub fn new(
        agent_type: AgentType,
        event_id: Option<String>,
        venue_id: Option<String>,
    ) -> ChatResult<Self> {
        let context = Self {
            agent_type,
            event_id: event_id.filter(|id| !id.trim().is_empty()),
            venue_id: venue_id.filter(|id| !id.trim().is_empty()),
        };
        context.validate()?;
        Ok(context)
    }

    /// Read `agentType`, `eventId` and `venueId` from request metadata.
    pub fn from_metadata(metadata: &Map<String, Value>) -> ChatResult<Self> {
        let agent_type = match metadata.get("agentType") {
            Some(Value::String(raw)) => raw
                .parse::<AgentType>()
                .map_err(|e| ChatError::validation("metadata.agentType", e))?,
            Some(_) => {
                return Err(ChatError::validation(
                    "metadata.agentType",
                    "must be a string",
                ));
            }
            None => return Err(ChatError::validation("metadata.agentType", "is required")),
        };

        let string_field = |key: &str, field: &'static str| -> ChatResult<Option<String>> {
            match metadata.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(Value::Number(n)) => Ok(Some(n.to_string())),
                Some(_) => Err(ChatError::validation(field, "must be a string")),
            }
        };

        Self::new(
            agent_type,
            string_field("eventId", "metadata.eventId")?,
            string_field("venueId", "metadata.venueId")?,
        )
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.agent_type.requires_event() && self.event_id.is_none() {
            return Err(ChatError::validation(
                "metadata.eventId",
                format!("required for agent type {}", self.agent_type),
            ));
        }
        if self.agent_type.requires_venue() && self.venue_id.is_none() {
            return Err(ChatError::validation(
                "metadata.venueId",
                format!("required for agent type {}", self.agent_type),
            ));
        }
        Ok(())
    }
}

/// Owner of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadOwner {
    pub user_id: String,
    pub role: Role,
}

impl ThreadOwner {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub owner: ThreadOwner,
    pub agent: AgentContext,
    pub title: String,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `threads` row.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ThreadRow {
    pub id: String,
    pub user_id: String,
    pub user_role: String,
    pub agent_type: String,
    pub event_id: Option<String>,
    pub venue_id: Option<String>,
    pub title: String,
    pub metadata: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<ThreadRow> for Thread {
    type Error = anyhow::Error;

    fn try_from(row: ThreadRow) -> anyhow::Result<Self> {
        let role = row
            .user_role
            .parse::<Role>()
            .map_err(|e| anyhow!("thread {}: {}", row.id, e))?;
        let agent_type = row
            .agent_type
            .parse::<AgentType>()
            .map_err(|e| anyhow!("thread {}: {}", row.id, e))?;
        let metadata = match serde_json::from_str::<Value>(&row.metadata)
            .with_context(|| format!("parsing metadata of thread {}", row.id))?
        {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(anyhow!("thread {} metadata is not an object: {}", row.id, other)),
        };

        Ok(Self {
            owner: ThreadOwner::new(row.user_id, role),
            agent: AgentContext {
                agent_type,
                event_id: row.event_id,
                venue_id: row.venue_id,
            },
            title: row.title,
            metadata,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
            id: row.id,
        })
    }
}

/// Input for creating a thread.
#[derive(Debug, Clone)]
pub struct NewThread {
    /// Explicit id; one is allocated when absent.
    pub id: Option<String>,
    pub owner: ThreadOwner,
    pub agent: AgentContext,
    pub title: String,
    pub metadata: Map<String, Value>,
}

/// Mutable thread fields. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl ThreadUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.metadata.is_none()
    }
}

/// Pagination window for thread listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of threads, newest activity first.
#[derive(Debug, Clone)]
pub struct ThreadPage {
    pub threads: Vec<Thread>,
    /// True when the page was full, so another page may exist.
    pub has_more: bool,
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            _ => Err(format!("unknown message role: {}", s)),
        }
    }
}

/// A message in the streaming-chat SDK shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(skip)]
    pub thread_id: String,
    /// Position within the thread, assigned at write time.
    #[serde(skip)]
    pub seq: i64,
    pub role: MessageRole,
    pub parts: Vec<Part>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Concatenated text of all `text` parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Input for appending a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub parts: Vec<Part>,
}

impl NewMessage {
    /// A message with a single text part.
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::text(text)],
        }
    }
}

/// Raw `messages` row.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub seq: i64,
    pub role: String,
    pub created_at: i64,
}

impl MessageRow {
    pub fn into_message(self, parts: Vec<Part>) -> anyhow::Result<Message> {
        let role = self
            .role
            .parse::<MessageRole>()
            .map_err(|e| anyhow!("message {}: {}", self.id, e))?;
        Ok(Message {
            created_at: from_millis(self.created_at)?,
            id: self.id,
            thread_id: self.thread_id,
            seq: self.seq,
            role,
            parts,
        })
    }
}

//! Agent engine configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which engine answers user messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentProvider {
    /// OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    Openai,
    /// Repeats the user's message. For local development.
    Echo,
}

/// Agent engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub provider: AgentProvider,
    /// Base URL of the completion API, without the `/chat/completions` suffix.
    pub base_url: String,
    /// API key. Accepts `env:VAR_NAME`.
    pub api_key: Option<String>,
    pub model: String,
    /// Request timeout in seconds. 0 disables the timeout.
    pub timeout_secs: u64,
    pub instructions: AgentInstructions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: AgentProvider::default(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: Some("env:OPENAI_API_KEY".to_string()),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            instructions: AgentInstructions::default(),
        }
    }
}

impl AgentConfig {
    /// Resolve the API key, expanding `env:VAR_NAME` syntax.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        match &self.api_key {
            None => Ok(None),
            Some(value) => match value.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map(Some)
                    .with_context(|| format!("reading agent API key from ${var_name}")),
                None => Ok(Some(value.clone())),
            },
        }
    }
}

/// Instruction templates per agent variant.
///
/// `{event_id}` and `{venue_id}` are replaced with the thread's context ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInstructions {
    pub client: String,
    pub venue_general: String,
    pub venue_event: String,
}

impl Default for AgentInstructions {
    fn default() -> Self {
        Self {
            client: "You are an event-planning assistant helping a client plan event {event_id}. \
                     Help them compare venues, vendors and budgets, and keep answers concise."
                .to_string(),
            venue_general: "You are an assistant for the staff of venue {venue_id}. \
                            Help with availability, pricing and general venue operations."
                .to_string(),
            venue_event: "You are an assistant for the staff of venue {venue_id} working on event {event_id}. \
                          Help coordinate logistics, timelines and client requests for this event."
                .to_string(),
        }
    }
}

//! Client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AgentConfig, AgentEngine, AgentHandle, AgentOutput};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Engine that sends the instructions and user text to `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiCompatEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatEngine {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("building HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(&config.base_url, config.resolve_api_key()?, timeout)
    }
}

#[async_trait]
impl AgentEngine for OpenAiCompatEngine {
    async fn run(&self, agent: &AgentHandle, input: &str) -> Result<AgentOutput> {
        let body = ChatCompletionRequest {
            model: &agent.model,
            messages: vec![
                ChatCompletionMessage {
                    role: "system",
                    content: &agent.instructions,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: input,
                },
            ],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("calling {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("completion endpoint returned {}: {}", status, text);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("decoding completion response")?;

        let final_output = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        tracing::debug!(
            agent_type = %agent.agent_type,
            model = %agent.model,
            chars = final_output.len(),
            "Agent completed"
        );

        Ok(AgentOutput { final_output })
    }
}

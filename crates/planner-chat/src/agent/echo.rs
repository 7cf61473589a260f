use async_trait::async_trait;

use super::{AgentEngine, AgentHandle, AgentOutput};

/// Answers with the user's own text.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoEngine;

#[async_trait]
impl AgentEngine for EchoEngine {
    async fn run(&self, _agent: &AgentHandle, input: &str) -> anyhow::Result<AgentOutput> {
        Ok(AgentOutput::new(input))
    }
}

//! Agent engine boundary.
//!
//! The protocol handler hands the user's text to an [`AgentEngine`] together
//! with an [`AgentHandle`] describing which assistant to run. Engines are
//! opaque: the handler only consumes the final output text.

mod config;
mod echo;
mod openai;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::{AgentConfig, AgentInstructions, AgentProvider};
pub use echo::EchoEngine;
pub use openai::OpenAiCompatEngine;
pub use registry::AgentRegistry;

use crate::threads::AgentType;

/// A configured assistant ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub agent_type: AgentType,
    pub model: String,
    /// System instructions with the thread's event/venue ids filled in.
    pub instructions: String,
}

/// Result of one agent run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentOutput {
    pub final_output: String,
}

impl AgentOutput {
    pub fn new(final_output: impl Into<String>) -> Self {
        Self {
            final_output: final_output.into(),
        }
    }
}

/// Runs an agent to completion on one user input.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    async fn run(&self, agent: &AgentHandle, input: &str) -> anyhow::Result<AgentOutput>;
}

/// Build the engine selected by `config.provider`.
pub fn build_engine(config: &AgentConfig) -> anyhow::Result<Arc<dyn AgentEngine>> {
    match config.provider {
        AgentProvider::Openai => Ok(Arc::new(OpenAiCompatEngine::from_config(config)?)),
        AgentProvider::Echo => Ok(Arc::new(EchoEngine)),
    }
}

//! Resolves a thread's agent context to a runnable handle.

use super::{AgentConfig, AgentHandle, AgentInstructions};
use crate::threads::{AgentContext, AgentType};

/// Maps agent variants to model and instructions.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    model: String,
    instructions: AgentInstructions,
}

impl AgentRegistry {
    pub fn new(model: impl Into<String>, instructions: AgentInstructions) -> Self {
        Self {
            model: model.into(),
            instructions,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.model.clone(), config.instructions.clone())
    }

    /// Build the handle for a thread's agent context.
    pub fn handle_for(&self, context: &AgentContext) -> AgentHandle {
        let template = match context.agent_type {
            AgentType::Client => &self.instructions.client,
            AgentType::VenueGeneral => &self.instructions.venue_general,
            AgentType::VenueEvent => &self.instructions.venue_event,
        };

        let instructions = template
            .replace("{event_id}", context.event_id.as_deref().unwrap_or(""))
            .replace("{venue_id}", context.venue_id.as_deref().unwrap_or(""));

        AgentHandle {
            agent_type: context.agent_type,
            model: self.model.clone(),
            instructions,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_substitutes_context() {
        let registry = AgentRegistry::new(
            "test-model",
            AgentInstructions {
                client: "client {event_id}".into(),
                venue_general: "venue {venue_id}".into(),
                venue_event: "venue {venue_id} event {event_id}".into(),
            },
        );

        let context =
            AgentContext::new(AgentType::VenueEvent, Some("evt_1".into()), Some("ven_2".into()))
                .unwrap();
        let handle = registry.handle_for(&context);
        assert_eq!(handle.agent_type, AgentType::VenueEvent);
        assert_eq!(handle.model, "test-model");
        assert_eq!(handle.instructions, "venue ven_2 event evt_1");

        let context = AgentContext::new(AgentType::Client, Some("evt_5".into()), None).unwrap();
        assert_eq!(registry.handle_for(&context).instructions, "client evt_5");
    }
}

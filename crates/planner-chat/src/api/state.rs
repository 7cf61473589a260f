//! Application state shared by all handlers.

use std::sync::Arc;

use crate::agent::{AgentEngine, AgentRegistry};
use crate::auth::AuthState;
use crate::db::Database;
use crate::protocol::{ChatConfig, ProtocolHandler};
use crate::threads::{BranchEditor, ThreadRepository};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database handle, for health checks.
    pub database: Database,
    /// Chat-widget protocol dispatcher.
    pub protocol: ProtocolHandler,
    /// Thread store.
    pub threads: ThreadRepository,
    /// Branch deletion.
    pub branches: BranchEditor,
    /// Authentication state.
    pub auth: AuthState,
}

impl AppState {
    pub fn new(
        database: Database,
        agents: AgentRegistry,
        engine: Arc<dyn AgentEngine>,
        chat: ChatConfig,
        auth: AuthState,
    ) -> Self {
        let threads = ThreadRepository::new(database.pool().clone());
        Self {
            database,
            protocol: ProtocolHandler::new(threads.clone(), agents, engine, chat),
            branches: BranchEditor::new(threads.clone()),
            threads,
            auth,
        }
    }
}

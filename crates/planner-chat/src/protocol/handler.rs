//! Protocol handler: validates requests, drives the store and the agent,
//! and produces either a JSON document or a stream of events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::events::{DeleteResult, ItemPage, ThreadDetail, ThreadItem, ThreadList, ThreadStreamEvent, ThreadView};
use super::request::{ChatRequest, RequestEnvelope};
use crate::agent::{AgentEngine, AgentRegistry};
use crate::threads::{
    AgentContext, ChatError, ChatResult, ListOptions, MessageRole, NewMessage, NewThread, Thread,
    ThreadOwner, ThreadRepository, ThreadUpdate,
};

/// Sent as the assistant turn when the engine produces no text.
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "I'm sorry, I couldn't generate a response. Please try again.";

/// Maximum characters of the first message used as thread title.
pub const TITLE_MAX_CHARS: usize = 50;

const EVENT_BUFFER: usize = 16;

/// Title derived from the first user message.
pub fn derive_title(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.chars();
    let title: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{title}...")
    } else {
        title
    }
}

/// Chat protocol settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Page size of `threads.list` when the request gives none.
    pub default_page_size: i64,
    /// Upper bound for a requested page size.
    pub max_page_size: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Phase of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Dispatching,
    PersistingUser,
    AgentInvoking,
    PersistingAssistant,
    Completed,
    Errored,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Errored)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (from, Errored) => !from.is_terminal(),
            (Idle, Validating)
            | (Validating, Dispatching)
            | (Dispatching, PersistingUser)
            | (Dispatching, Completed)
            | (PersistingUser, AgentInvoking)
            | (AgentInvoking, PersistingAssistant)
            | (PersistingAssistant, Completed) => true,
            _ => false,
        }
    }
}

/// Phase tracker for one request.
#[derive(Debug)]
pub struct RequestRun {
    kind: &'static str,
    phase: Phase,
}

impl RequestRun {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`. Illegal transitions are refused and leave the phase unchanged.
    pub fn advance(&mut self, next: Phase) -> ChatResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(ChatError::Store(anyhow::anyhow!(
                "illegal phase transition for {}: {:?} -> {:?}",
                self.kind,
                self.phase,
                next
            )));
        }
        debug!(request = self.kind, from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
        Ok(())
    }

    /// Move to `Errored` unless already terminal.
    pub fn fail(&mut self, err: &ChatError) {
        if self.phase.is_terminal() {
            return;
        }
        match err {
            ChatError::Validation { .. } | ChatError::NotFound(_) => {
                debug!(request = self.kind, phase = ?self.phase, error = %err, "Request rejected");
            }
            _ => {
                warn!(request = self.kind, phase = ?self.phase, error = %err, "Request failed");
            }
        }
        self.phase = Phase::Errored;
    }
}

/// Stream of events for a streaming request.
pub type EventStream = ReceiverStream<ThreadStreamEvent>;

/// Outcome of a request.
pub enum ProtocolResponse {
    Json(Value),
    Stream(EventStream),
}

impl std::fmt::Debug for ProtocolResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolResponse::Json(value) => f.debug_tuple("Json").field(value).finish(),
            ProtocolResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Work item of a streaming request.
enum Turn {
    NewThread {
        owner: ThreadOwner,
        agent: AgentContext,
        text: String,
        metadata: Map<String, Value>,
    },
    Existing {
        thread: Thread,
        text: String,
    },
}

/// Dispatches chat-widget requests.
#[derive(Clone)]
pub struct ProtocolHandler {
    threads: ThreadRepository,
    agents: Arc<AgentRegistry>,
    engine: Arc<dyn AgentEngine>,
    config: ChatConfig,
}

impl ProtocolHandler {
    pub fn new(
        threads: ThreadRepository,
        agents: AgentRegistry,
        engine: Arc<dyn AgentEngine>,
        config: ChatConfig,
    ) -> Self {
        Self {
            threads,
            agents: Arc::new(agents),
            engine,
            config,
        }
    }

    /// Decode an envelope and handle it.
    ///
    /// Validation and lookup failures are returned before any stream is opened.
    pub async fn handle_envelope(
        &self,
        owner: &ThreadOwner,
        envelope: RequestEnvelope,
    ) -> ChatResult<ProtocolResponse> {
        let mut run = RequestRun::new("envelope");
        run.advance(Phase::Validating)?;
        match ChatRequest::from_envelope(envelope) {
            Ok(request) => {
                run.kind = request.kind();
                self.dispatch(run, owner, request).await
            }
            Err(err) => {
                run.fail(&err);
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        mut run: RequestRun,
        owner: &ThreadOwner,
        request: ChatRequest,
    ) -> ChatResult<ProtocolResponse> {
        match self.prepare(&mut run, owner, request).await {
            Ok(Prepared::Json(value)) => {
                run.advance(Phase::Completed)?;
                Ok(ProtocolResponse::Json(value))
            }
            Ok(Prepared::Turn(turn)) => Ok(ProtocolResponse::Stream(self.spawn_turn(run, turn))),
            Err(err) => {
                run.fail(&err);
                Err(err)
            }
        }
    }

    /// Validate the request and run it up to the point where streaming starts.
    async fn prepare(
        &self,
        run: &mut RequestRun,
        owner: &ThreadOwner,
        request: ChatRequest,
    ) -> ChatResult<Prepared> {
        match request {
            ChatRequest::CreateThread { text, metadata } => {
                let agent = AgentContext::from_metadata(&metadata)?;
                run.advance(Phase::Dispatching)?;
                Ok(Prepared::Turn(Turn::NewThread {
                    owner: owner.clone(),
                    agent,
                    text,
                    metadata,
                }))
            }
            ChatRequest::AddUserMessage { thread_id, text } => {
                run.advance(Phase::Dispatching)?;
                let thread = self.owned_thread(&thread_id, owner).await?;
                Ok(Prepared::Turn(Turn::Existing { thread, text }))
            }
            ChatRequest::ListThreads { limit, offset } => {
                let options = self.list_options(limit, offset)?;
                run.advance(Phase::Dispatching)?;
                let page = self.threads.list_threads(&owner.user_id, options).await?;
                json(ThreadList {
                    data: page.threads.iter().map(ThreadView::from).collect(),
                    has_more: page.has_more,
                })
            }
            ChatRequest::GetThread { thread_id } => {
                run.advance(Phase::Dispatching)?;
                let thread = self.owned_thread(&thread_id, owner).await?;
                let messages = self.threads.list_messages(&thread.id).await?;
                json(ThreadDetail {
                    thread: ThreadView::from(&thread),
                    items: ItemPage {
                        data: messages.iter().map(ThreadItem::from).collect(),
                        has_more: false,
                    },
                })
            }
            ChatRequest::UpdateThread {
                thread_id,
                title,
                metadata,
            } => {
                let title = match title {
                    Some(title) if title.trim().is_empty() => {
                        return Err(ChatError::validation(
                            "params.title",
                            "must not be empty",
                        ));
                    }
                    other => other,
                };
                run.advance(Phase::Dispatching)?;
                self.owned_thread(&thread_id, owner).await?;
                let thread = self
                    .threads
                    .update_thread(&thread_id, ThreadUpdate { title, metadata })
                    .await?
                    .ok_or_else(|| ChatError::not_found(format!("thread {thread_id}")))?;
                json(ThreadView::from(&thread))
            }
            ChatRequest::DeleteThread { thread_id } => {
                run.advance(Phase::Dispatching)?;
                self.owned_thread(&thread_id, owner).await?;
                let success = self.threads.delete_thread(&thread_id).await?;
                info!(thread_id = %thread_id, "Deleted thread");
                json(DeleteResult { success })
            }
        }
    }

    async fn owned_thread(&self, thread_id: &str, owner: &ThreadOwner) -> ChatResult<Thread> {
        self.threads
            .get_thread_for_owner(thread_id, &owner.user_id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("thread {thread_id}")))
    }

    fn list_options(&self, limit: Option<i64>, offset: Option<i64>) -> ChatResult<ListOptions> {
        let limit = match limit {
            None => self.config.default_page_size,
            Some(limit) if limit < 1 => {
                return Err(ChatError::validation("params.limit", "must be at least 1"));
            }
            Some(limit) => limit.min(self.config.max_page_size),
        };
        let offset = match offset {
            None => 0,
            Some(offset) if offset < 0 => {
                return Err(ChatError::validation("params.offset", "must not be negative"));
            }
            Some(offset) => offset,
        };
        Ok(ListOptions { limit, offset })
    }

    fn spawn_turn(&self, mut run: RequestRun, turn: Turn) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handler = self.clone();

        tokio::spawn(async move {
            if let Err(err) = handler.run_turn(&mut run, turn, &tx).await {
                run.fail(&err);
                // Receiver may already be gone; nothing left to report to.
                let _ = tx.send(ThreadStreamEvent::error(err.public_message())).await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run_turn(
        &self,
        run: &mut RequestRun,
        turn: Turn,
        tx: &mpsc::Sender<ThreadStreamEvent>,
    ) -> ChatResult<()> {
        let (thread, text) = match turn {
            Turn::NewThread {
                owner,
                agent,
                text,
                metadata,
            } => {
                let thread = self
                    .threads
                    .create_thread(NewThread {
                        id: None,
                        owner,
                        agent,
                        title: derive_title(&text),
                        metadata,
                    })
                    .await?;
                info!(
                    thread_id = %thread.id,
                    agent_type = %thread.agent.agent_type,
                    "Created thread"
                );
                if !emit(tx, ThreadStreamEvent::thread_created(&thread)).await {
                    return disconnected(run, &thread);
                }
                (thread, text)
            }
            Turn::Existing { thread, text } => (thread, text),
        };

        run.advance(Phase::PersistingUser)?;
        let user_message = self
            .threads
            .add_message(&thread.id, NewMessage::text(MessageRole::User, &text))
            .await?;
        if !emit(tx, ThreadStreamEvent::item_done(&user_message)).await {
            return disconnected(run, &thread);
        }

        run.advance(Phase::AgentInvoking)?;
        let handle = self.agents.handle_for(&thread.agent);
        let output = tokio::select! {
            result = self.engine.run(&handle, &text) => {
                result.map_err(|e| ChatError::agent(format!("{e:#}")))?
            }
            _ = tx.closed() => return disconnected(run, &thread),
        };

        let reply = if output.final_output.trim().is_empty() {
            warn!(thread_id = %thread.id, "Agent returned empty output, using fallback");
            EMPTY_RESPONSE_FALLBACK.to_string()
        } else {
            output.final_output
        };

        run.advance(Phase::PersistingAssistant)?;
        let assistant_message = self
            .threads
            .add_message(&thread.id, NewMessage::text(MessageRole::Assistant, reply))
            .await?;
        emit(tx, ThreadStreamEvent::item_done(&assistant_message)).await;

        run.advance(Phase::Completed)?;
        Ok(())
    }
}

enum Prepared {
    Json(Value),
    Turn(Turn),
}

fn json<T: Serialize>(body: T) -> ChatResult<Prepared> {
    let value = serde_json::to_value(body).map_err(anyhow::Error::from)?;
    Ok(Prepared::Json(value))
}

/// Send an event; false when the client has gone away.
async fn emit(tx: &mpsc::Sender<ThreadStreamEvent>, event: ThreadStreamEvent) -> bool {
    let name = event.name();
    if tx.send(event).await.is_err() {
        return false;
    }
    debug!(event = name, "Emitted event");
    true
}

fn disconnected(run: &mut RequestRun, thread: &Thread) -> ChatResult<()> {
    info!(
        thread_id = %thread.id,
        phase = ?run.phase(),
        "Client disconnected, skipping remaining turn"
    );
    run.phase = Phase::Errored;
    Ok(())
}

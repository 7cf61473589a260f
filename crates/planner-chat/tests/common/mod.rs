//! Test utilities and common setup.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use serde_json::Value;
use sqlx::SqlitePool;

use planner_chat::agent::{AgentEngine, AgentHandle, AgentOutput, AgentRegistry, EchoEngine};
use planner_chat::api;
use planner_chat::auth::{AuthConfig, AuthState, DevUser, Role};
use planner_chat::db::Database;
use planner_chat::protocol::ChatConfig;

pub const CLIENT: &str = "client_1";
pub const VENUE: &str = "venue_1";
pub const OTHER_CLIENT: &str = "client_2";
pub const JWT_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";

/// Replies with a fixed text.
pub struct StaticEngine(pub &'static str);

#[async_trait]
impl AgentEngine for StaticEngine {
    async fn run(&self, _agent: &AgentHandle, _input: &str) -> anyhow::Result<AgentOutput> {
        Ok(AgentOutput::new(self.0))
    }
}

/// Always fails.
pub struct FailingEngine;

#[async_trait]
impl AgentEngine for FailingEngine {
    async fn run(&self, _agent: &AgentHandle, _input: &str) -> anyhow::Result<AgentOutput> {
        Err(anyhow::anyhow!("upstream model unavailable"))
    }
}

/// Answers the first `successes` calls, then fails.
pub struct FailsAfter {
    successes: usize,
    calls: AtomicUsize,
}

impl FailsAfter {
    pub fn new(successes: usize) -> Self {
        Self {
            successes,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AgentEngine for FailsAfter {
    async fn run(&self, _agent: &AgentHandle, input: &str) -> anyhow::Result<AgentOutput> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.successes {
            Ok(AgentOutput::new(format!("re: {input}")))
        } else {
            Err(anyhow::anyhow!("upstream model unavailable"))
        }
    }
}

/// Replies after `delay`; `finished` flips only if the reply was produced.
pub struct SlowEngine {
    pub delay: Duration,
    pub finished: Arc<AtomicBool>,
}

impl SlowEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl AgentEngine for SlowEngine {
    async fn run(&self, _agent: &AgentHandle, _input: &str) -> anyhow::Result<AgentOutput> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(AgentOutput::new("late reply"))
    }
}

/// Drops the parts table while "thinking", so the assistant turn cannot be stored.
pub struct TableDroppingEngine(pub SqlitePool);

#[async_trait]
impl AgentEngine for TableDroppingEngine {
    async fn run(&self, _agent: &AgentHandle, _input: &str) -> anyhow::Result<AgentOutput> {
        sqlx::query("DROP TABLE message_parts")
            .execute(&self.0)
            .await?;
        Ok(AgentOutput::new("never stored"))
    }
}

fn dev_user(id: &str, name: &str, role: Role) -> DevUser {
    DevUser {
        id: id.to_string(),
        name: name.to_string(),
        email: None,
        role,
    }
}

/// Dev-mode auth config with a client, a venue and a second client.
fn test_auth_config() -> AuthConfig {
    AuthConfig {
        dev_mode: true,
        jwt_secret: Some(JWT_SECRET.to_string()),
        dev_users: vec![
            dev_user(CLIENT, "Casey Client", Role::Client),
            dev_user(VENUE, "Harbor Hall", Role::Venue),
            dev_user(OTHER_CLIENT, "Other Client", Role::Client),
        ],
        allowed_origins: vec![],
    }
}

/// A router over an in-memory database, with the database kept for row checks.
pub struct TestApp {
    pub router: Router,
    pub db: Database,
}

impl TestApp {
    /// Send a request and return the response.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Count rows of `table`.
    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}

/// Create a test application whose agent answers with `engine`.
pub async fn test_app_with_engine(engine: Arc<dyn AgentEngine>) -> TestApp {
    test_app_with(move |_| engine).await
}

/// Create a test application whose engine is built from the test database.
pub async fn test_app_with<F>(make_engine: F) -> TestApp
where
    F: FnOnce(&Database) -> Arc<dyn AgentEngine>,
{
    let db = Database::in_memory().await.unwrap();
    let auth = AuthState::new(test_auth_config());
    let engine = make_engine(&db);

    let state = api::AppState::new(
        db.clone(),
        AgentRegistry::default(),
        engine,
        ChatConfig::default(),
        auth,
    );

    TestApp {
        router: api::create_router(state),
        db,
    }
}

/// Create a test application backed by the echo engine.
pub async fn test_app() -> TestApp {
    test_app_with_engine(Arc::new(EchoEngine)).await
}

/// JSON request authenticated through the dev-user header.
pub fn json_request(method: Method, uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Dev-User", user)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

/// Bodyless request authenticated through the dev-user header.
pub fn empty_request(method: Method, uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Dev-User", user)
        .body(Body::empty())
        .unwrap()
}

/// `POST /chatkit` as `user`.
pub fn chatkit_request(user: &str, envelope: Value) -> Request<Body> {
    json_request(Method::POST, "/chatkit", user, envelope)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Read an SSE body to completion and parse each `data:` frame.
pub async fn sse_events(response: Response<Body>) -> Vec<Value> {
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

/// `type` tags of a list of events.
pub fn event_types(events: &[Value]) -> Vec<&str> {
    events
        .iter()
        .map(|event| event["type"].as_str().unwrap_or_default())
        .collect()
}

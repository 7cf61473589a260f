//! Streaming-chat SDK message endpoint tests.

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

mod common;
use common::{
    CLIENT, OTHER_CLIENT, TestApp, body_json, chatkit_request, empty_request, json_request,
    sse_events, test_app,
};

async fn new_thread(app: &TestApp) -> String {
    let response = app
        .send(chatkit_request(
            CLIENT,
            json!({
                "type": "threads.create",
                "params": { "input": { "content": [{ "type": "input_text", "text": "Kickoff" }] } },
                "metadata": { "agentType": "client", "eventId": "evt_1" }
            }),
        ))
        .await;
    let events = sse_events(response).await;
    events[0]["thread"]["id"].as_str().unwrap().to_string()
}

async fn append(app: &TestApp, thread_id: &str, role: &str, parts: Value) -> Value {
    let response = app
        .send(json_request(
            Method::POST,
            &format!("/threads/{thread_id}/messages"),
            CLIENT,
            json!({ "role": role, "parts": parts }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn list(app: &TestApp, thread_id: &str) -> Vec<Value> {
    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/threads/{thread_id}/messages"),
            CLIENT,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await.as_array().unwrap().clone()
}

#[tokio::test]
async fn test_list_messages_in_sdk_shape() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;

    let messages = list(&app, &thread_id).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["parts"], json!([{ "type": "text", "text": "Kickoff" }]));
    assert_eq!(messages[1]["role"], "assistant");
    assert!(messages[0]["id"].as_str().unwrap().starts_with("msg_"));
    assert!(messages[0]["createdAt"].is_string());
    assert!(messages[0].get("threadId").is_none());
}

#[tokio::test]
async fn test_append_preserves_rich_parts() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;

    let parts = json!([
        { "type": "reasoning", "text": "Checking availability first." },
        {
            "type": "tool-call",
            "toolCallId": "call_1",
            "toolName": "searchVenues",
            "state": "input-available",
            "input": { "city": "Austin", "guests": 120 }
        },
        {
            "type": "tool-result",
            "toolCallId": "call_1",
            "toolName": "searchVenues",
            "state": "output-available",
            "input": { "city": "Austin", "guests": 120 },
            "output": { "venues": ["Barn at Pecan Creek"] }
        },
        { "type": "source-url", "sourceId": "src_1", "url": "https://example.com/barn", "title": "Barn" },
        { "type": "data-booking", "id": "bk_1", "data": { "status": "held" } },
        { "type": "text", "text": "The Barn at Pecan Creek is free that weekend." }
    ]);

    let created = append(&app, &thread_id, "assistant", parts.clone()).await;
    assert_eq!(created["parts"], parts);

    let messages = list(&app, &thread_id).await;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["id"], created["id"]);
    assert_eq!(messages[2]["parts"], parts);
}

#[tokio::test]
async fn test_unmodelled_part_fields_survive() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;

    let parts = json!([
        { "type": "reasoning", "text": "Pricing first.", "state": "done" },
        {
            "type": "tool-result",
            "toolCallId": "call_2",
            "toolName": "webSearch",
            "state": "output-available",
            "input": { "q": "florists" },
            "output": { "hits": 4 },
            "providerExecuted": true
        },
        {
            "type": "data-quote",
            "id": "q_1",
            "data": { "amount": 1800 },
            "providerMetadata": { "crm": { "dealId": "d_9" } }
        },
        { "type": "text", "text": "Here are four florists.", "state": "done" }
    ]);

    let created = append(&app, &thread_id, "assistant", parts.clone()).await;
    assert_eq!(created["parts"], parts);
    assert_eq!(list(&app, &thread_id).await[2]["parts"], parts);
}

#[tokio::test]
async fn test_malformed_body_uses_error_body() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/threads/{thread_id}/messages"),
            CLIENT,
            json!({ "role": "user" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert_eq!(app.count("messages").await, 2);
}

#[tokio::test]
async fn test_unknown_part_types_survive() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;

    let parts = json!([
        { "type": "step-start" },
        { "type": "text", "text": "after the step" }
    ]);
    let created = append(&app, &thread_id, "assistant", parts.clone()).await;
    assert_eq!(created["parts"], parts);
}

#[tokio::test]
async fn test_append_requires_parts() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/threads/{thread_id}/messages"),
            CLIENT,
            json!({ "role": "user", "parts": [] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.count("messages").await, 2);
}

#[tokio::test]
async fn test_replace_message_parts() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;
    let messages = list(&app, &thread_id).await;
    let assistant_id = messages[1]["id"].as_str().unwrap();

    let parts = json!([
        { "type": "text", "text": "Revised answer" },
        { "type": "file", "mediaType": "application/pdf", "filename": "quote.pdf", "url": "https://example.com/quote.pdf" }
    ]);
    let response = app
        .send(json_request(
            Method::PUT,
            &format!("/messages/{assistant_id}/parts"),
            CLIENT,
            json!({ "parts": parts }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["role"], "assistant");
    assert_eq!(updated["parts"], parts);

    assert_eq!(list(&app, &thread_id).await[1]["parts"], parts);
}

#[tokio::test]
async fn test_delete_message_truncates_branch() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;
    append(&app, &thread_id, "user", json!([{ "type": "text", "text": "B" }])).await;
    append(&app, &thread_id, "assistant", json!([{ "type": "text", "text": "C" }])).await;

    let messages = list(&app, &thread_id).await;
    assert_eq!(messages.len(), 4);
    let first_id = messages[0]["id"].clone();
    let branch_point = messages[1]["id"].as_str().unwrap();

    let response = app
        .send(empty_request(
            Method::DELETE,
            &format!("/messages/{branch_point}"),
            CLIENT,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 3);

    let remaining = list(&app, &thread_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], first_id);
    assert_eq!(app.count("message_parts").await, 1);
}

#[tokio::test]
async fn test_delete_unknown_message() {
    let app = test_app().await;

    let response = app
        .send(empty_request(Method::DELETE, "/messages/msg_missing", CLIENT))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_foreign_messages_are_hidden() {
    let app = test_app().await;
    let thread_id = new_thread(&app).await;
    let message_id = list(&app, &thread_id).await[0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/threads/{thread_id}/messages"),
            OTHER_CLIENT,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            Method::PUT,
            &format!("/messages/{message_id}/parts"),
            OTHER_CLIENT,
            json!({ "parts": [{ "type": "text", "text": "hijacked" }] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(empty_request(
            Method::DELETE,
            &format!("/messages/{message_id}"),
            OTHER_CLIENT,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(app.count("messages").await, 2);
}

//! Streaming-chat SDK message endpoints.
//!
//! Messages are exchanged as `{id, role, parts, createdAt}` with parts in the
//! SDK's typed shape. Every route is scoped to threads the caller owns.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::error::{ApiError, ApiJson, ApiResult};
use super::state::AppState;
use crate::auth::CurrentUser;
use crate::threads::{Message, MessageRole, NewMessage, Part, Thread};

/// Body of `POST /threads/{thread_id}/messages`.
#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub role: MessageRole,
    pub parts: Vec<Part>,
}

/// Body of `PUT /messages/{message_id}/parts`.
#[derive(Debug, Deserialize)]
pub struct ReplacePartsRequest {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageResponse {
    pub deleted: usize,
}

async fn owned_thread(state: &AppState, user: &CurrentUser, thread_id: &str) -> ApiResult<Thread> {
    state
        .threads
        .get_thread_for_owner(thread_id, user.id())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("thread {thread_id}")))
}

async fn owned_message(
    state: &AppState,
    user: &CurrentUser,
    message_id: &str,
) -> ApiResult<Message> {
    let message = state
        .threads
        .get_message(message_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("message {message_id}")))?;

    // Foreign messages look exactly like missing ones.
    if state
        .threads
        .get_thread_for_owner(&message.thread_id, user.id())
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!("message {message_id}")));
    }
    Ok(message)
}

fn require_parts(parts: &[Part]) -> ApiResult<()> {
    if parts.is_empty() {
        return Err(ApiError::bad_request("a message needs at least one part"));
    }
    Ok(())
}

/// List the messages of a thread.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list_thread_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let thread = owned_thread(&state, &user, &thread_id).await?;
    let messages = state.threads.list_messages(&thread.id).await?;
    Ok(Json(messages))
}

/// Append a message to a thread.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn append_thread_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thread_id): Path<String>,
    ApiJson(request): ApiJson<AppendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    require_parts(&request.parts)?;
    let thread = owned_thread(&state, &user, &thread_id).await?;

    let message = state
        .threads
        .add_message(
            &thread.id,
            NewMessage {
                role: request.role,
                parts: request.parts,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Replace the parts of a message.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn replace_message_parts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(message_id): Path<String>,
    ApiJson(request): ApiJson<ReplacePartsRequest>,
) -> ApiResult<Json<Message>> {
    require_parts(&request.parts)?;
    owned_message(&state, &user, &message_id).await?;

    let message = state
        .threads
        .replace_message_parts(&message_id, request.parts)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("message {message_id}")))?;

    Ok(Json(message))
}

/// Delete a message and everything after it in its thread.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(message_id): Path<String>,
) -> ApiResult<Json<DeleteMessageResponse>> {
    owned_message(&state, &user, &message_id).await?;

    let deleted = state
        .branches
        .delete_message_and_descendants(&message_id)
        .await?;
    info!(message_id = %message_id, deleted, "Truncated thread");

    Ok(Json(DeleteMessageResponse { deleted }))
}

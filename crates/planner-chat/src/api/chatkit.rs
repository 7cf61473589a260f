//! `POST /chatkit`: the chat-widget transport.
//!
//! Streaming requests answer `text/event-stream`, one `data:` frame per event.
//! Everything else answers a single JSON document.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::header::HeaderName,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use tracing::{instrument, warn};

use super::error::{ApiJson, ApiResult};
use super::state::AppState;
use crate::auth::CurrentUser;
use crate::protocol::{EventStream, ProtocolResponse, RequestEnvelope, ThreadStreamEvent};

/// Handle one protocol envelope.
#[instrument(skip(state, user, envelope), fields(user_id = %user.id(), request = %envelope.kind))]
pub async fn chatkit(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(envelope): ApiJson<RequestEnvelope>,
) -> ApiResult<Response> {
    let response = state
        .protocol
        .handle_envelope(&user.owner(), envelope)
        .await?;

    Ok(match response {
        ProtocolResponse::Json(body) => Json(body).into_response(),
        ProtocolResponse::Stream(events) => (
            [(HeaderName::from_static("x-accel-buffering"), "no")],
            event_stream(events),
        )
            .into_response(),
    })
}

fn sse_event(event: &ThreadStreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(err) => {
            warn!("Failed to serialize stream event: {:?}", err);
            Event::default().data(r#"{"type":"error","error":{"message":"serialization failed"}}"#)
        }
    }
}

/// Frame protocol events as SSE.
pub fn event_stream(events: EventStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = events.map(|event| Ok::<_, Infallible>(sse_event(&event)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}


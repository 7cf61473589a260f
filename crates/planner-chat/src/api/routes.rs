//! API route definitions.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::chatkit;
use super::handlers;
use super::messages;
use super::state::AppState;
use crate::auth::auth_middleware;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let cors = build_cors_layer(&state);

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/chatkit", post(chatkit::chatkit))
        .route(
            "/threads/{thread_id}/messages",
            get(messages::list_thread_messages).post(messages::append_thread_message),
        )
        .route(
            "/messages/{message_id}/parts",
            put(messages::replace_message_parts),
        )
        .route("/messages/{message_id}", delete(messages::delete_message))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(trace_layer)
}

/// Build the CORS layer based on configuration.
///
/// In dev mode with no configured origins, allows localhost origins.
fn build_cors_layer(state: &AppState) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::COOKIE,
        header::HeaderName::from_static("x-dev-user"),
    ];

    let mut origins: Vec<HeaderValue> = state
        .auth
        .allowed_origins()
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if state.auth.is_dev_mode() {
        for origin in ["http://localhost:3000", "http://127.0.0.1:3000"] {
            let value = HeaderValue::from_static(origin);
            if !origins.contains(&value) {
                origins.push(value);
            }
        }
    }

    if origins.is_empty() {
        tracing::warn!("CORS: No usable origins configured, denying cross-origin requests");
        return CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static("null")));
    }

    tracing::info!("CORS: Allowing {} origin(s)", origins.len());
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

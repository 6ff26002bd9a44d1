use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::commands;
use crate::state::AppState;

pub const ORIGIN_HEADER: &str = "x-command-origin";

#[derive(Debug, Serialize)]
struct Reply {
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
    instances: usize,
    auto_shutdown: bool,
}

fn reply(message: impl Into<String>) -> Json<Reply> {
    Json(Reply {
        message: message.into(),
    })
}

pub fn router(state: AppState) -> Router {
    let command_routes = Router::new()
        .route("/servers", get(list_servers))
        .route("/status/:name", get(status))
        .route("/start/:name", post(start))
        .layer(middleware::from_fn_with_state(state.clone(), origin_guard));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/commands", command_routes)
        .with_state(state)
}

fn origin_is_allowed(allowed: &[String], headers: &HeaderMap) -> bool {
    if allowed.is_empty() {
        return true;
    }
    headers
        .get(ORIGIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .is_some_and(|origin| allowed.iter().any(|a| a == origin))
}

// Middleware: commands may only come from an allowed origin (e.g. one chat channel).
async fn origin_guard(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    if !origin_is_allowed(&state.allowed_origins, req.headers()) {
        tracing::warn!(path = %req.uri().path(), "command rejected: origin not allowed");
        let hint = match state.allowed_origins.as_slice() {
            [only] => format!("This command can only be used from {only}."),
            _ => "This command can only be used from the designated channel.".to_string(),
        };
        return (StatusCode::FORBIDDEN, reply(hint)).into_response();
    }
    next.run(req).await
}

async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        instances: state.registry.len(),
        auto_shutdown: state.auto_shutdown,
    })
}

async fn list_servers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        commands::list(&state.registry)
            .into_iter()
            .map(|n| n.0)
            .collect(),
    )
}

async fn status(State(state): State<AppState>, Path(name): Path<String>) -> Json<Reply> {
    reply(commands::status(&state.registry, state.remote.as_ref(), &name).await)
}

async fn start(State(state): State<AppState>, Path(name): Path<String>) -> Json<Reply> {
    reply(commands::start(&state.registry, state.remote.as_ref(), &name).await)
}

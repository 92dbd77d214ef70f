//! Interactive HTTP surface.
//!
//! `POST /chat` runs one chat transaction behind a shared-secret header;
//! requests failing the credential check are rejected uniformly with 401
//! before any processing. `GET /` and `GET /health` report subsystem status.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::engine::ChatMessage;
use crate::orchestrator::Orchestrator;
use crate::routing::Category;

/// Shared state for the request path. Transactions share no mutable state
/// beyond what the orchestrator already guards internally.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub secret: SecretString,
    pub mailbox_enabled: bool,
}

/// Chat request body. History is caller-supplied per call — there is no
/// durable cross-restart conversation storage.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub category: Category,
    pub history: Vec<ChatMessage>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/", get(root))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    // Credential check first — a failed check must cause no processing at
    // all, and missing vs. wrong secrets are indistinguishable to the caller.
    let provided = headers.get("x-secret").and_then(|v| v.to_str().ok());
    if provided != Some(state.secret.expose_secret()) {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".into()));
    }

    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid request body".into()))?;

    match state
        .orchestrator
        .chat(&request.message, request.history.unwrap_or_default())
        .await
    {
        Ok(outcome) => Ok(Json(ChatResponse {
            reply: outcome.reply,
            category: outcome.category,
            history: outcome.history,
        })),
        Err(e) => {
            tracing::error!(error = %e, "Chat transaction failed");
            Err((
                StatusCode::BAD_GATEWAY,
                "Reasoning engine unavailable".into(),
            ))
        }
    }
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "online",
        "email_worker": if state.mailbox_enabled { "active" } else { "disabled" },
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "mailbox_configured": state.mailbox_enabled,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

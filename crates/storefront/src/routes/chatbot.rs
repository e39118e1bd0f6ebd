//! Chatbot API. Public and rate limited per client IP.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::{JsonBody, QueryParams};
use crate::middleware::chatbot_rate_limiter;
use crate::services::ChatReply;
use crate::state::AppState;

const SERVICE_NAME: &str = "Shonifity Chatbot";

/// Build the chatbot router with its rate limiter applied.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/message", post(message))
        .route("/suggestions", get(suggestions))
        .route("/health", get(health))
        .route_layer(chatbot_rate_limiter())
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatbotHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub ollama: bool,
    pub timestamp: DateTime<Utc>,
}

#[instrument(skip(state, body))]
pub async fn message(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<MessageRequest>,
) -> Result<Json<ChatReply>> {
    let text = body.message.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }
    Ok(Json(state.chatbot().reply(text).await))
}

#[instrument(skip(state))]
pub async fn suggestions(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SuggestionsQuery>,
) -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: state.chatbot().suggestions(&query.query),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<ChatbotHealth> {
    Json(ChatbotHealth {
        status: "ok",
        service: SERVICE_NAME,
        ollama: state.chatbot().uses_ollama(),
        timestamp: Utc::now(),
    })
}

//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`               : Send a message, get the advisor's reply
//! - `GET    /v1/conversations/{id}` : Stored turns of a conversation
//! - `DELETE /v1/conversations/{id}` : Clear a conversation
//! - `GET    /v1/usage`              : Cost and budget snapshot

use axum::{
    Router,
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use tellerbot_agent::{ChatReply, ChatRequest, ChatService};
use tellerbot_core::error::{Error, ProviderError};
use tellerbot_core::message::{ConversationId, Turn};
use tellerbot_core::ValidationError;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub chat: Arc<ChatService>,
    /// Inbound message length limit, in characters.
    pub max_message_chars: usize,
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route(
            "/conversations/{id}",
            get(get_conversation_handler).delete(reset_conversation_handler),
        )
        .route("/usage", get(usage_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatBody {
    /// The customer's message.
    message: String,
    /// Existing conversation ID (omit to start a new one).
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub turns: Vec<Turn>,
    /// Sum of the per-turn token estimates.
    pub estimated_tokens: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ResetResponse {
    pub conversation_id: String,
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// ── Errors ────────────────────────────────────────────────────────────────

/// An error rendered as `{ error, kind }` with a mapped status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                kind: kind.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        let status = match e.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, "invalid_request", e.body_text())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidRequest(v) => v.into(),
            Error::Provider(p) => {
                let status = match &p {
                    ProviderError::UpstreamRejected { .. } | ProviderError::MalformedResponse(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    ProviderError::NotConfigured(_)
                    | ProviderError::UpstreamUnavailable(_)
                    | ProviderError::UpstreamError { .. } => StatusCode::SERVICE_UNAVAILABLE,
                };
                Self::new(status, p.kind(), p.to_string())
            }
            Error::Store(s) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                s.to_string(),
            ),
            other => {
                error!(error = %other, "Unhandled internal error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `POST /v1/chat`
async fn chat_handler(
    State(state): State<SharedApiState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = payload?;
    let request = ChatRequest::parse(
        &body.message,
        body.conversation_id.as_deref(),
        state.max_message_chars,
    )?;

    info!(
        conversation = %request.conversation_id,
        message_chars = request.message.chars().count(),
        "Chat request received"
    );

    let reply = state.chat.chat(request).await?;
    Ok(Json(reply))
}

/// `GET /v1/conversations/{id}`
async fn get_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let id = ConversationId::parse(&id)?;
    let conversation = state.chat.conversation(&id).await?;
    Ok(Json(ConversationResponse {
        conversation_id: conversation.id.to_string(),
        estimated_tokens: conversation.estimated_tokens(),
        turns: conversation.turns().to_vec(),
    }))
}

/// `DELETE /v1/conversations/{id}`
async fn reset_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let id = ConversationId::parse(&id)?;
    let removed = state.chat.reset(&id).await?;
    Ok(Json(ResetResponse {
        conversation_id: id.to_string(),
        removed,
    }))
}

/// `GET /v1/usage`
async fn usage_handler(State(state): State<SharedApiState>) -> impl IntoResponse {
    Json(state.chat.usage())
}

//! Route handler functions for all API endpoints.
//!
//! Handlers only translate between HTTP and the message router; every
//! conversational decision lives in `medibook-chat`.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use medibook_chat::{execute_action, ActionOutcome, RouterReply, StreamEvent};
use medibook_core::types::{Appointment, User};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Router reply plus the outcome of its action, if one was attached.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub reply: RouterReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_result: Option<ActionOutcome>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    pub user_id: String,
    pub appointments: Vec<Appointment>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /users - register a user with an idle booking session.
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user_id = body.user_id.trim();
    let name = body.name.trim();
    if user_id.is_empty() || name.is_empty() {
        return Err(ApiError::BadRequest(
            "user_id and name must not be empty".to_string(),
        ));
    }

    let user = state.users.create(user_id, name)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /chat - route one message and return the whole reply.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .router
        .handle_message(&body.user_id, &body.message)
        .await?;
    let action_result = reply.action.as_ref().map(|a| execute_action(Some(a)));

    Ok(Json(ChatResponse {
        reply,
        action_result,
    }))
}

/// POST /chat/stream - route one message and stream the reply as SSE.
///
/// Emits `fragment` events, then a terminal `done` event carrying the full
/// reply as JSON, or an `error` event if generation fails midway.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let events = state
        .router
        .handle_message_stream(&body.user_id, &body.message)
        .await?;

    let stream = events.map(|event| {
        let sse = match event {
            StreamEvent::Fragment(text) => Event::default().event("fragment").data(text),
            StreamEvent::Done(reply) => {
                let data = serde_json::to_string(&reply).unwrap_or_default();
                Event::default().event("done").data(data)
            }
            StreamEvent::Error(message) => Event::default().event("error").data(message),
        };
        Ok(sse)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// GET /appointments/{user_id} - list a user's appointments in creation order.
pub async fn appointments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    if state.users.get(&user_id)?.is_none() {
        return Err(ApiError::NotFound(format!("User not found: {}", user_id)));
    }

    let appointments = state.appointments.list_by_user(&user_id)?;
    Ok(Json(AppointmentsResponse {
        user_id,
        appointments,
    }))
}

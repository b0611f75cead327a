//! API Handler implementations for session management.
//!
//! This module provides HTTP request handlers for session operations.

use axum::extract::{Json, Path, State};
use chrono::Utc;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::sessions::types::{
    CurrentSessionResponse, HealthResponse, ListSessionsResponse, MessageResponse,
    SessionResponse,
};
use crate::host::HostState;

/// GET /health
///
/// Returns basic health status of the kernel.
pub async fn health_check(State(state): State<Arc<HostState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        sessions: state.registry().len(),
        timestamp: Utc::now(),
    })
}

/// GET /api/v1/sessions
///
/// List all live sessions with metadata.
pub async fn list_sessions(State(state): State<Arc<HostState>>) -> Json<ListSessionsResponse> {
    Json(ListSessionsResponse {
        sessions: state.list_sessions().await,
    })
}

/// POST /api/v1/sessions
///
/// Create a new session and make it current.
pub async fn create_session(
    State(state): State<Arc<HostState>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = state.init().await?;
    Ok(Json(SessionResponse {
        session_id: id.to_string(),
    }))
}

/// DELETE /api/v1/sessions/{id}
///
/// Close a session and remove its workspace.
pub async fn delete_session(
    State(state): State<Arc<HostState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.close_session(&id).await?;
    Ok(Json(MessageResponse { message }))
}

/// GET /api/v1/sessions/current
pub async fn get_current_session(
    State(state): State<Arc<HostState>>,
) -> Json<CurrentSessionResponse> {
    Json(CurrentSessionResponse {
        session_id: state.get_current_session().await,
    })
}

/// DELETE /api/v1/sessions/current
pub async fn close_current_session(State(state): State<Arc<HostState>>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: state.close_current_session().await,
    })
}

//! REST API routes for session management.

use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;

use crate::api::sessions::handlers::{
    close_current_session, create_session, delete_session, get_current_session, health_check,
    list_sessions,
};
use crate::host::HostState;

/// API routes for session management.
///
/// Creates a router with all session-related endpoints mounted at `/api/v1`.
/// Also includes the basic health check at `/health`.
pub fn routes() -> Router<Arc<HostState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/v1/sessions/current",
            get(get_current_session).delete(close_current_session),
        )
        .route("/api/v1/sessions/{id}", delete(delete_session))
}

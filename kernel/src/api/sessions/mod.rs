//! REST API endpoints for session management.
//!
//! Sessions are isolated workspaces inside the shared execution environment.
//! These endpoints create, list and close them and expose the current
//! session.

pub mod handlers;
pub mod routes;
pub mod types;

pub use routes::routes;
pub use types::{
    CurrentSessionResponse, HealthResponse, ListSessionsResponse, MessageResponse,
    SessionResponse,
};

//! Request/Response Types for Session API
//!
//! This module provides DTOs for session management operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::host::SessionSummary;

/// A session id, as returned when a session is created.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    /// Session identifier.
    pub session_id: String,
}

/// List sessions response payload.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResponse {
    /// Live sessions, oldest first.
    pub sessions: Vec<SessionSummary>,
}

/// Current session response payload.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentSessionResponse {
    /// Current session id; empty when there is none.
    pub session_id: String,
}

/// Plain message response payload.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Human-readable result.
    pub message: String,
}

/// Health check response payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Number of live sessions.
    pub sessions: usize,
    /// Timestamp of the check.
    pub timestamp: DateTime<Utc>,
}

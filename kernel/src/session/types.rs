//! Types for session management.
//!
//! This module provides the session identifier, the per-session record kept
//! in the registry, and the error type shared by the session layer.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::environment::EnvironmentError;
use crate::sandbox::PathEscapeError;

const ID_LEN: usize = 32;

/// Opaque, unguessable session identifier (32 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parses a caller-supplied identifier.
    ///
    /// Anything that could not have been produced by [`SessionId::generate`]
    /// is rejected, which also keeps ids safe to use as path segments.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let well_formed = raw.len() == ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(raw.to_string()))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Metadata kept for a live session. Timestamps are seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionRecord {
    pub(crate) created_at: f64,
    pub(crate) last_used_at: f64,
}

impl SessionRecord {
    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    /// Time of the last acquisition.
    #[must_use]
    pub fn last_used_at(&self) -> f64 {
        self.last_used_at
    }
}

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A caller-supplied path would leave its root.
    #[error(transparent)]
    PathEscape(#[from] PathEscapeError),
    /// The session id is not in the registry.
    #[error("Unknown session '{0}' (use init to create one)")]
    UnknownSession(String),
    /// The operation needs an explicit session id.
    #[error("session_id is required")]
    SessionRequired,
    /// The execution environment failed.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

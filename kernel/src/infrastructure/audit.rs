use serde::Serialize;
use tracing::{info, info_span};

/// Domain event for audit logging.
/// Structured for JSON serialization to enable machine-readable audit trails.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The kernel started.
    SystemStartup {
        /// Component that started.
        component: String,
    },
    /// The kernel is shutting down.
    SystemShutdown {
        /// Why.
        reason: String,
    },
    /// A caller-supplied path tried to leave its root.
    PathDenied {
        /// Operation that received the path.
        operation: String,
        /// The offending path.
        path: String,
    },
    /// A session was dropped to stay within capacity.
    SessionEvicted {
        /// Evicted session.
        session_id: String,
    },
    /// The whole environment was recreated.
    EnvironmentReset {
        /// Sessions discarded by the reset.
        sessions_removed: usize,
    },
}

/// Logs an audit event to the dedicated audit channel as structured JSON.
/// This uses a specific `target` which can be filtered by the subscriber to redirect to a secure file.
pub fn log_audit(event: &AuditEvent) {
    let span = info_span!(target: "audit", "audit_event");
    let _enter = span.enter();

    let json = serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
    info!(target: "audit", audit_json = %json, "Audit Event");
}

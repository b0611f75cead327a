//! Session lifecycle configuration.

use serde::Deserialize;
use std::time::Duration;

/// Session registry settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    /// Directory inside the environment holding one workspace per session
    /// (default: "/workspace/sessions")
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Idle time in seconds after which a session expires (default: 600)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of live sessions (default: 32)
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Seconds between janitor sweeps (default: 60)
    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,

    /// Mirror the current session into a marker file so it survives a
    /// restart of this process (default: false)
    #[serde(default)]
    pub persist_current: bool,

    /// Reject stateful operations that omit a session id instead of falling
    /// back to the current session (default: false)
    #[serde(default)]
    pub require_explicit: bool,
}

impl SessionSettings {
    /// Idle time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Janitor tick interval.
    #[must_use]
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            ttl_secs: default_ttl_secs(),
            max_sessions: default_max_sessions(),
            janitor_interval_secs: default_janitor_interval_secs(),
            persist_current: false,
            require_explicit: false,
        }
    }
}

fn default_base_dir() -> String {
    "/workspace/sessions".to_string()
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_sessions() -> usize {
    32
}

fn default_janitor_interval_secs() -> u64 {
    60
}

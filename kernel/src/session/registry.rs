//! Registry of live sessions.
//!
//! Each session owns one workspace directory `{base_dir}/{id}` inside the
//! execution environment. The table is authoritative for whether a session is
//! usable; directory removal is best-effort and may lag behind it.
//!
//! Lock discipline: one mutex guards the table and is only held for table
//! reads and writes. Every environment call happens with the lock released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::clock::Clock;
use super::types::{SessionError, SessionId, SessionRecord};
use crate::environment::ExecutionEnvironment;
use crate::infrastructure::audit::{log_audit, AuditEvent};
use crate::infrastructure::config::SessionSettings;

/// Why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Closed,
    Expired,
    Evicted,
    Reset,
}

impl Removal {
    fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Expired => "expired",
            Self::Evicted => "evicted",
            Self::Reset => "reset",
        }
    }
}

/// Concurrent table of live sessions.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
    environment: Arc<dyn ExecutionEnvironment>,
    clock: Arc<dyn Clock>,
    base_dir: String,
    max_sessions: usize,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("session_count", &self.sessions.lock().len())
            .field("base_dir", &self.base_dir)
            .field("max_sessions", &self.max_sessions)
            .field("environment", &self.environment.name())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Creates an empty registry. A `max_sessions` of zero is treated as one.
    #[must_use]
    pub fn new(
        environment: Arc<dyn ExecutionEnvironment>,
        clock: Arc<dyn Clock>,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            environment,
            clock,
            base_dir: settings.base_dir.trim_end_matches('/').to_string(),
            max_sessions: settings.max_sessions.max(1),
        }
    }

    /// Directory holding every session workspace.
    #[must_use]
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// Workspace directory of `id`, whether or not it is registered.
    #[must_use]
    pub fn workspace_path(&self, id: &SessionId) -> String {
        format!("{}/{id}", self.base_dir)
    }

    /// Capacity bound.
    #[must_use]
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Clock used for all timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Environment the workspaces live in.
    #[must_use]
    pub fn environment(&self) -> &Arc<dyn ExecutionEnvironment> {
        &self.environment
    }

    /// Creates a session and its workspace directory.
    ///
    /// If the registry grows past capacity, the least recently used other
    /// sessions are evicted before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace directory cannot be created; no
    /// registry entry is left behind in that case.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<SessionId, SessionError> {
        let id = SessionId::generate();
        self.environment
            .make_dir(&self.workspace_path(&id))
            .await?;

        let now = self.clock.now();
        let evicted = {
            let mut sessions = self.sessions.lock();
            sessions.insert(
                id.clone(),
                SessionRecord {
                    created_at: now,
                    last_used_at: now,
                },
            );
            evict_over_capacity(&mut sessions, self.max_sessions, &id)
        };

        info!(session_id = %id, "Session created");
        metrics::counter!("pyexec_sessions_created_total").increment(1);
        self.discard_all(evicted, Removal::Evicted).await;
        self.report_active();
        Ok(id)
    }

    /// Re-registers a session whose workspace already exists, counting the
    /// adoption as a use. Capacity is enforced as in [`Self::create`].
    #[instrument(skip(self))]
    pub async fn adopt(&self, id: &SessionId) {
        let now = self.clock.now();
        let evicted = {
            let mut sessions = self.sessions.lock();
            sessions
                .entry(id.clone())
                .and_modify(|record| record.last_used_at = now)
                .or_insert(SessionRecord {
                    created_at: now,
                    last_used_at: now,
                });
            evict_over_capacity(&mut sessions, self.max_sessions, id)
        };

        info!(session_id = %id, "Session adopted");
        self.discard_all(evicted, Removal::Evicted).await;
        self.report_active();
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Record of `id`, if registered.
    #[must_use]
    pub fn record(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.lock().get(id).copied()
    }

    /// Marks `id` as used now. Returns `false` if it is not registered.
    pub fn touch(&self, id: &SessionId) -> bool {
        let now = self.clock.now();
        match self.sessions.lock().get_mut(id) {
            Some(record) => {
                record.last_used_at = now;
                true
            }
            None => false,
        }
    }

    /// Removes `id` and its workspace. Idempotent; the directory removal is
    /// attempted even if `id` was not registered.
    ///
    /// Returns whether `id` was registered.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &SessionId) -> bool {
        let was_present = self.sessions.lock().remove(id).is_some();
        self.discard(id, Removal::Closed, was_present).await;
        if was_present {
            self.report_active();
        }
        was_present
    }

    /// Removes every session idle for longer than `ttl`.
    ///
    /// Each candidate is re-checked under the lock at removal time, so a
    /// session touched after the scan survives.
    pub async fn sweep_expired(&self, ttl: Duration) -> Vec<SessionId> {
        let ttl = ttl.as_secs_f64();
        let now = self.clock.now();
        let mut candidates: Vec<SessionId> = self
            .sessions
            .lock()
            .iter()
            .filter(|(_, record)| now - record.last_used_at > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        candidates.sort();

        let mut removed = Vec::with_capacity(candidates.len());
        for id in candidates {
            let still_expired = {
                let mut sessions = self.sessions.lock();
                let expired = sessions
                    .get(&id)
                    .is_some_and(|record| now - record.last_used_at > ttl);
                if expired {
                    sessions.remove(&id);
                }
                expired
            };
            if still_expired {
                self.discard(&id, Removal::Expired, true).await;
                removed.push(id);
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Expired sessions swept");
            self.report_active();
        }
        removed
    }

    /// Removes every session. Returns the ids that were registered.
    pub async fn clear(&self) -> Vec<SessionId> {
        let mut drained: Vec<SessionId> = self.sessions.lock().drain().map(|(id, _)| id).collect();
        drained.sort();
        self.discard_all(drained.clone(), Removal::Reset).await;
        self.report_active();
        drained
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// All live sessions, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SessionId, SessionRecord)> {
        let mut sessions: Vec<_> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, record)| (id.clone(), *record))
            .collect();
        sessions.sort_by(|a, b| {
            a.1.created_at
                .total_cmp(&b.1.created_at)
                .then_with(|| a.0.cmp(&b.0))
        });
        sessions
    }

    async fn discard_all(&self, ids: Vec<SessionId>, reason: Removal) {
        for id in ids {
            if reason == Removal::Evicted {
                log_audit(&AuditEvent::SessionEvicted {
                    session_id: id.to_string(),
                });
            }
            self.discard(&id, reason, true).await;
        }
    }

    /// Best-effort workspace removal for a session already out of the table.
    async fn discard(&self, id: &SessionId, reason: Removal, was_present: bool) {
        let path = self.workspace_path(id);
        if let Err(e) = self.environment.remove_dir(&path).await {
            warn!(session_id = %id, error = %e, "Failed to remove session workspace");
        } else {
            debug!(session_id = %id, path = %path, "Session workspace removed");
        }
        if was_present {
            info!(session_id = %id, reason = reason.as_str(), "Session removed");
            metrics::counter!("pyexec_sessions_removed_total", "reason" => reason.as_str())
                .increment(1);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn report_active(&self) {
        metrics::gauge!("pyexec_sessions_active").set(self.len() as f64);
    }
}

/// Evicts least recently used sessions other than `keep` until the table is
/// within `max`. Ties on `last_used_at` are broken by id.
fn evict_over_capacity(
    sessions: &mut HashMap<SessionId, SessionRecord>,
    max: usize,
    keep: &SessionId,
) -> Vec<SessionId> {
    let Some(excess) = sessions.len().checked_sub(max).filter(|n| *n > 0) else {
        return Vec::new();
    };

    let mut candidates: Vec<(f64, SessionId)> = sessions
        .iter()
        .filter(|(id, _)| *id != keep)
        .map(|(id, record)| (record.last_used_at, id.clone()))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    candidates
        .into_iter()
        .take(excess)
        .map(|(_, id)| {
            sessions.remove(&id);
            id
        })
        .collect()
}

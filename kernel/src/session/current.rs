//! The session used when an operation names none.
//!
//! The pointer is either unset or set to one id. It lives in memory and is
//! optionally mirrored through a [`CurrentSessionStore`]. When the in-memory
//! value is unset, the mirror is consulted: a mirrored session still within
//! its TTL is re-registered and adopted, anything else is discarded.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::registry::SessionRegistry;
use super::store::CurrentSessionStore;
use super::types::SessionId;

/// Current-session pointer for one logical connection.
#[derive(Debug)]
pub struct CurrentSession {
    slot: Mutex<Option<SessionId>>,
    store: Arc<dyn CurrentSessionStore>,
    registry: Arc<SessionRegistry>,
    ttl: Duration,
}

impl CurrentSession {
    /// Creates an unset pointer.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn CurrentSessionStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            slot: Mutex::new(None),
            store,
            registry,
            ttl,
        }
    }

    /// Sets or clears the pointer and mirrors the change.
    ///
    /// Mirror failures are logged; the in-memory value stays authoritative.
    pub async fn set(&self, id: Option<SessionId>) {
        *self.slot.lock() = id.clone();
        if let Err(e) = self.store.save(id.as_ref()).await {
            warn!(error = %e, "Failed to persist current session marker");
        }
    }

    /// Clears the pointer if it currently names `id`.
    pub async fn clear_if(&self, id: &SessionId) -> bool {
        let cleared = {
            let mut slot = self.slot.lock();
            if slot.as_ref() == Some(id) {
                *slot = None;
                true
            } else {
                false
            }
        };
        if cleared {
            if let Err(e) = self.store.save(None).await {
                warn!(error = %e, "Failed to clear current session marker");
            }
        }
        cleared
    }

    /// The current session, recovering it from the mirror if needed.
    pub async fn get(&self) -> Option<SessionId> {
        if let Some(id) = self.slot.lock().clone() {
            return Some(id);
        }
        self.recover().await
    }

    /// Records a use of `id` in the mirror. Best-effort.
    pub async fn note_use(&self, id: &SessionId) {
        let now = self.registry.clock().now();
        if let Err(e) = self.store.record_use(id, now).await {
            debug!(session_id = %id, error = %e, "Failed to record session use");
        }
    }

    async fn recover(&self) -> Option<SessionId> {
        let id = self.store.load().await?;

        let now = self.registry.clock().now();
        let fresh = self
            .store
            .last_used(&id)
            .await
            .is_some_and(|last_used| now - last_used <= self.ttl.as_secs_f64());

        if !fresh {
            info!(session_id = %id, "Persisted current session expired; discarding");
            if let Err(e) = self.store.save(None).await {
                warn!(error = %e, "Failed to discard expired current session marker");
            }
            return None;
        }

        self.registry.adopt(&id).await;
        let adopted = {
            let mut slot = self.slot.lock();
            slot.get_or_insert_with(|| id.clone()).clone()
        };
        info!(session_id = %adopted, "Recovered current session");
        Some(adopted)
    }
}

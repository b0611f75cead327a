//! Scoped session acquisition.
//!
//! Every tool operation asks a [`SessionContext`] for the session to work in.
//! The caller may name one explicitly; otherwise the operation's
//! [`AcquirePolicy`] decides. Ephemeral sessions are released when the scope
//! ends, on success, on error, and when the scope future is dropped.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::current::CurrentSession;
use super::registry::SessionRegistry;
use super::types::{SessionError, SessionId};
use crate::environment::ExecutionEnvironment;
use crate::sandbox::{remote, PathEscapeError};

/// What to do when the caller names no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePolicy {
    /// Use the current session, creating and promoting one if needed.
    ReuseCurrent,
    /// Create a one-shot session, removed when the scope ends.
    Ephemeral,
    /// Fail with [`SessionError::SessionRequired`].
    Require,
}

/// A resolved session workspace inside the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    session_id: SessionId,
    root: String,
}

impl Workspace {
    /// The owning session.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Absolute path of the workspace directory.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolves a workspace-relative path.
    ///
    /// # Errors
    ///
    /// Returns an error for absolute paths and `..` segments.
    pub fn resolve(&self, relative: &str) -> Result<String, PathEscapeError> {
        remote::resolve(&self.root, relative)
    }
}

/// A session handed out by [`SessionContext::acquire`].
///
/// Ephemeral leases should be ended with [`SessionLease::release`]; if one is
/// dropped instead, removal is spawned onto the current runtime.
#[derive(Debug)]
pub struct SessionLease {
    workspace: Workspace,
    owned: Option<Arc<SessionRegistry>>,
}

impl SessionLease {
    /// The leased workspace.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Whether the session is removed when the lease ends.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.owned.is_some()
    }

    /// Ends the lease, removing the session if it is ephemeral.
    pub async fn release(mut self) {
        if let Some(registry) = self.owned.take() {
            registry.remove(&self.workspace.session_id).await;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let Some(registry) = self.owned.take() else {
            return;
        };
        let id = self.workspace.session_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(session_id = %id, "Ephemeral lease dropped; scheduling removal");
                handle.spawn(async move {
                    registry.remove(&id).await;
                });
            }
            Err(_) => {
                warn!(
                    session_id = %id,
                    "Ephemeral lease dropped outside a runtime; left for the janitor"
                );
            }
        }
    }
}

/// Resolves sessions for tool operations.
#[derive(Debug, Clone)]
pub struct SessionContext {
    environment: Arc<dyn ExecutionEnvironment>,
    registry: Arc<SessionRegistry>,
    current: Arc<CurrentSession>,
}

impl SessionContext {
    /// Creates a context over a registry and its current-session pointer.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, current: Arc<CurrentSession>) -> Self {
        Self {
            environment: registry.environment().clone(),
            registry,
            current,
        }
    }

    /// Resolves the session to operate on.
    ///
    /// An explicit `requested` id must already be registered; it is never
    /// created implicitly. The resolved session is touched before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment is not ready, the id is unknown,
    /// the policy requires an id, or a new session cannot be created.
    pub async fn acquire(
        &self,
        requested: Option<&str>,
        policy: AcquirePolicy,
    ) -> Result<SessionLease, SessionError> {
        self.environment.ensure_ready().await?;

        let requested = requested.map(str::trim).filter(|id| !id.is_empty());
        let (id, owned) = match requested {
            Some(raw) => {
                let id = SessionId::parse(raw)
                    .filter(|id| self.registry.contains(id))
                    .ok_or_else(|| SessionError::UnknownSession(raw.to_string()))?;
                (id, false)
            }
            None => match policy {
                AcquirePolicy::ReuseCurrent => (self.current_or_create().await?, false),
                AcquirePolicy::Ephemeral => (self.registry.create().await?, true),
                AcquirePolicy::Require => return Err(SessionError::SessionRequired),
            },
        };

        // Evicted between resolution and use; a caller-named id is reported
        if !self.registry.touch(&id) {
            return Err(SessionError::UnknownSession(id.to_string()));
        }
        if !owned {
            self.current.note_use(&id).await;
        }

        Ok(SessionLease {
            workspace: Workspace {
                root: self.registry.workspace_path(&id),
                session_id: id,
            },
            owned: owned.then(|| self.registry.clone()),
        })
    }

    /// Runs `operation` inside a resolved workspace and ends the lease
    /// afterwards, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error or the operation's own error.
    pub async fn scope<T, F, Fut>(
        &self,
        requested: Option<&str>,
        policy: AcquirePolicy,
        operation: F,
    ) -> Result<T, SessionError>
    where
        F: FnOnce(Workspace) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let lease = self.acquire(requested, policy).await?;
        let result = operation(lease.workspace().clone()).await;
        lease.release().await;
        result
    }

    async fn current_or_create(&self) -> Result<SessionId, SessionError> {
        if let Some(id) = self.current.get().await {
            if self.registry.contains(&id) {
                return Ok(id);
            }
        }
        let id = self.registry.create().await?;
        self.current.set(Some(id.clone())).await;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;
    use crate::infrastructure::config::SessionSettings;
    use crate::session::clock::ManualClock;
    use crate::session::store::NoPersistence;
    use std::time::Duration;

    fn context() -> (
        Arc<MemoryEnvironment>,
        Arc<SessionRegistry>,
        Arc<CurrentSession>,
        SessionContext,
    ) {
        let env = Arc::new(MemoryEnvironment::new());
        let registry = Arc::new(SessionRegistry::new(
            env.clone(),
            Arc::new(ManualClock::new(0.0)),
            &SessionSettings::default(),
        ));
        let current = Arc::new(CurrentSession::new(
            registry.clone(),
            Arc::new(NoPersistence),
            Duration::from_secs(600),
        ));
        let context = SessionContext::new(registry.clone(), current.clone());
        (env, registry, current, context)
    }

    #[tokio::test]
    async fn test_explicit_known_id_is_used() -> anyhow::Result<()> {
        let (_env, registry, current, context) = context();
        let id = registry.create().await?;

        let lease = context.acquire(Some(id.as_str()), AcquirePolicy::Require).await?;
        assert_eq!(lease.workspace().session_id(), &id);
        assert!(!lease.is_ephemeral());
        assert_eq!(current.get().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_unknown_id_is_rejected_not_created() {
        let (_env, registry, _current, context) = context();
        let unknown = SessionId::generate();

        for policy in [
            AcquirePolicy::ReuseCurrent,
            AcquirePolicy::Ephemeral,
            AcquirePolicy::Require,
        ] {
            let result = context.acquire(Some(unknown.as_str()), policy).await;
            assert!(matches!(result, Err(SessionError::UnknownSession(_))));
        }
        let result = context.acquire(Some("not-an-id"), AcquirePolicy::ReuseCurrent).await;
        assert!(matches!(result, Err(SessionError::UnknownSession(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reuse_current_creates_then_reuses() -> anyhow::Result<()> {
        let (env, registry, current, context) = context();

        let first = context.acquire(None, AcquirePolicy::ReuseCurrent).await?;
        let id = first.workspace().session_id().clone();
        assert_eq!(current.get().await, Some(id.clone()));

        let second = context.acquire(None, AcquirePolicy::ReuseCurrent).await?;
        assert_eq!(second.workspace().session_id(), &id);
        assert_eq!(registry.len(), 1);
        assert!(env.ready_calls() >= 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reuse_current_replaces_a_removed_current() -> anyhow::Result<()> {
        let (_env, registry, current, context) = context();
        let lease = context.acquire(None, AcquirePolicy::ReuseCurrent).await?;
        let old = lease.workspace().session_id().clone();
        registry.remove(&old).await;

        let lease = context.acquire(None, AcquirePolicy::ReuseCurrent).await?;
        let new = lease.workspace().session_id().clone();
        assert_ne!(old, new);
        assert_eq!(current.get().await, Some(new));
        Ok(())
    }

    #[tokio::test]
    async fn test_require_without_id_fails() {
        let (_env, registry, _current, context) = context();
        let result = context.acquire(None, AcquirePolicy::Require).await;
        assert!(matches!(result, Err(SessionError::SessionRequired)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_ephemeral_lease_is_removed() -> anyhow::Result<()> {
        let (_env, registry, _current, context) = context();
        let lease = context.acquire(None, AcquirePolicy::Ephemeral).await?;
        let id = lease.workspace().session_id().clone();
        assert!(registry.contains(&id));

        drop(lease);
        for _ in 0..100 {
            if !registry.contains(&id) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!registry.contains(&id));
        Ok(())
    }

    #[tokio::test]
    async fn test_workspace_resolves_inside_root() -> anyhow::Result<()> {
        let (_env, _registry, _current, context) = context();
        let lease = context.acquire(None, AcquirePolicy::ReuseCurrent).await?;
        let workspace = lease.workspace();

        assert_eq!(
            workspace.resolve("code/foo.py")?,
            format!("{}/code/foo.py", workspace.root())
        );
        assert!(workspace.resolve("../other").is_err());
        Ok(())
    }
}

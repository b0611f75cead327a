//! Host state management for the kernel.
//!
//! This module provides the `HostState` struct which serves as the central
//! coordination point for all tool operations: it owns the execution
//! environment handle, the session registry, the current-session pointer and
//! the host transfer roots.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::environment::ExecutionEnvironment;
use crate::infrastructure::config::{SessionSettings, WorkdirSettings};
use crate::sandbox::HostPolicy;
use crate::session::{
    AcquirePolicy, Clock, CurrentSession, CurrentSessionStore, Janitor, JanitorHandle,
    MarkerFileStore, NoPersistence, SessionContext, SessionRegistry,
};

/// Inner state shared behind an `Arc`.
pub(crate) struct HostStateInner {
    pub(crate) environment: Arc<dyn ExecutionEnvironment>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) current: Arc<CurrentSession>,
    pub(crate) context: SessionContext,
    pub(crate) inbound: HostPolicy,
    pub(crate) outbound: HostPolicy,
    pub(crate) ttl: Duration,
    pub(crate) janitor_interval: Duration,
    pub(crate) default_policy: AcquirePolicy,
    pub(crate) janitor: Mutex<Option<JanitorHandle>>,
}

/// The main host state for the kernel.
///
/// One `HostState` serves one logical connection: it tracks a single current
/// session. It uses an internal `Arc` for cheap cloning across handlers.
#[derive(Clone)]
pub struct HostState {
    pub(crate) inner: Arc<HostStateInner>,
}

impl std::fmt::Debug for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostState")
            .field("environment", &self.inner.environment.name())
            .field("registry", &self.inner.registry)
            .field("inbound", &self.inner.inbound.root())
            .field("outbound", &self.inner.outbound.root())
            .finish_non_exhaustive()
    }
}

impl HostState {
    /// Creates host state over an execution environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a host transfer root does not exist or cannot be
    /// canonicalized.
    pub fn new(
        environment: Arc<dyn ExecutionEnvironment>,
        clock: Arc<dyn Clock>,
        session: &SessionSettings,
        workdirs: &WorkdirSettings,
    ) -> Result<Self> {
        let inbound = HostPolicy::new(workdirs.input_dir())
            .context("Failed to initialize the upload root")?;
        let outbound = HostPolicy::new(workdirs.output_dir())
            .context("Failed to initialize the download root")?;

        let registry = Arc::new(SessionRegistry::new(environment.clone(), clock, session));
        let store: Arc<dyn CurrentSessionStore> = if session.persist_current {
            Arc::new(MarkerFileStore::new(environment.clone(), registry.base_dir()))
        } else {
            Arc::new(NoPersistence)
        };
        let current = Arc::new(CurrentSession::new(registry.clone(), store, session.ttl()));
        let context = SessionContext::new(registry.clone(), current.clone());

        let default_policy = if session.require_explicit {
            AcquirePolicy::Require
        } else {
            AcquirePolicy::ReuseCurrent
        };

        Ok(Self {
            inner: Arc::new(HostStateInner {
                environment,
                registry,
                current,
                context,
                inbound,
                outbound,
                ttl: session.ttl(),
                janitor_interval: session.janitor_interval(),
                default_policy,
                janitor: Mutex::new(None),
            }),
        })
    }

    /// The session registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    /// The current-session pointer.
    #[must_use]
    pub fn current(&self) -> &Arc<CurrentSession> {
        &self.inner.current
    }

    /// Scoped session acquisition.
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.inner.context
    }

    /// The execution environment.
    #[must_use]
    pub fn environment(&self) -> &Arc<dyn ExecutionEnvironment> {
        &self.inner.environment
    }

    /// Policy for operations called without a session id.
    #[must_use]
    pub fn default_policy(&self) -> AcquirePolicy {
        self.inner.default_policy
    }

    /// Root that upload sources are confined to.
    #[must_use]
    pub fn inbound(&self) -> &HostPolicy {
        &self.inner.inbound
    }

    /// Root that download targets are confined to.
    #[must_use]
    pub fn outbound(&self) -> &HostPolicy {
        &self.inner.outbound
    }

    /// Starts the expiry janitor. Later calls are no-ops.
    pub fn start_janitor(&self) {
        let mut janitor = self.inner.janitor.lock();
        if janitor.is_none() {
            *janitor = Some(Janitor::spawn(
                self.inner.registry.clone(),
                self.inner.ttl,
                self.inner.janitor_interval,
            ));
        }
    }

    /// Whether the janitor is running.
    #[must_use]
    pub fn janitor_running(&self) -> bool {
        self.inner.janitor.lock().is_some()
    }

    /// Stops the janitor if it is running.
    pub async fn shutdown(&self) {
        let handle = self.inner.janitor.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            info!("Host state shut down");
        }
    }
}

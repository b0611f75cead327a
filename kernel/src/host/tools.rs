//! Tool operations offered to callers.
//!
//! Every operation that touches a session goes through
//! [`SessionContext::scope`](crate::session::SessionContext::scope), and every
//! caller-supplied path is validated before the session is acquired.

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::state::HostState;
use crate::infrastructure::audit::{log_audit, AuditEvent};
use crate::report::render;
use crate::sandbox::{remote, PathEscapeError};
use crate::session::{AcquirePolicy, SessionError, SessionId};

/// One live session as reported by [`HostState::list_sessions`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: SessionId,
    /// Creation time, seconds since the epoch.
    pub created_at: f64,
    /// Last acquisition, seconds since the epoch.
    pub last_used_at: f64,
    /// Whether this is the current session.
    pub current: bool,
}

impl HostState {
    /// Ensures the environment is running, creates a session and makes it
    /// current.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be started or the
    /// workspace cannot be created.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<SessionId, SessionError> {
        self.inner.environment.ensure_ready().await?;
        let id = self.inner.registry.create().await?;
        self.inner.current.set(Some(id.clone())).await;
        info!(session_id = %id, "Current session replaced");
        Ok(id)
    }

    /// Same as [`HostState::init`].
    ///
    /// # Errors
    ///
    /// See [`HostState::init`].
    pub async fn new_current_session(&self) -> Result<SessionId, SessionError> {
        self.init().await
    }

    /// Runs Python source in a session workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if no session can be resolved or the environment
    /// fails. A non-zero exit of the program itself is reported, not raised.
    #[instrument(skip(self, code))]
    pub async fn run_code(
        &self,
        code: &str,
        session_id: Option<&str>,
    ) -> Result<String, SessionError> {
        self.run_code_with(code, session_id, self.default_policy()).await
    }

    /// Runs Python source in a one-shot session that is removed afterwards.
    /// The current session is left untouched.
    ///
    /// # Errors
    ///
    /// See [`HostState::run_code`].
    #[instrument(skip(self, code))]
    pub async fn run_code_ephemeral(&self, code: &str) -> Result<String, SessionError> {
        self.run_code_with(code, None, AcquirePolicy::Ephemeral).await
    }

    async fn run_code_with(
        &self,
        code: &str,
        session_id: Option<&str>,
        policy: AcquirePolicy,
    ) -> Result<String, SessionError> {
        let environment = self.inner.environment.clone();
        self.inner
            .context
            .scope(session_id, policy, move |workspace| async move {
                let output = environment.run_code(code, workspace.root()).await?;
                Ok(render(&output))
            })
            .await
    }

    /// Runs a script that already exists in the session workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` leaves the workspace, no session can be
    /// resolved, or the environment fails.
    #[instrument(skip(self))]
    pub async fn run_file(
        &self,
        path: &str,
        session_id: Option<&str>,
    ) -> Result<String, SessionError> {
        guard("run_file", remote::validate(path))?;

        let environment = self.inner.environment.clone();
        self.inner
            .context
            .scope(session_id, self.default_policy(), move |workspace| async move {
                let script = workspace.resolve(path)?;
                let output = environment.run_file(&script, workspace.root()).await?;
                Ok(render(&output))
            })
            .await
    }

    /// Copies a file from the upload root into the session workspace.
    ///
    /// `container_path` defaults to the file name of `local_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if either path leaves its root, no session can be
    /// resolved, or the copy fails.
    #[instrument(skip(self))]
    pub async fn cp_in(
        &self,
        local_path: &str,
        container_path: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<String, SessionError> {
        let source = guard("cp_in", self.inner.inbound.resolve(local_path))?;
        let target = match container_path.filter(|p| !p.is_empty()) {
            Some(path) => path,
            None => guard("cp_in", remote::default_name(local_path))?,
        };
        guard("cp_in", remote::validate(target))?;

        let environment = self.inner.environment.clone();
        self.inner
            .context
            .scope(session_id, self.default_policy(), move |workspace| async move {
                let destination = workspace.resolve(target)?;
                environment.copy_in(&source, &destination).await?;
                Ok(format!(
                    "Copied host:{} to container:{destination}",
                    source.display()
                ))
            })
            .await
    }

    /// Copies a file from the session workspace into the download root.
    ///
    /// `local_path` defaults to the file name of `container_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if either path leaves its root, no session can be
    /// resolved, or the copy fails.
    #[instrument(skip(self))]
    pub async fn cp_out(
        &self,
        container_path: &str,
        local_path: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<String, SessionError> {
        guard("cp_out", remote::validate(container_path))?;
        let local = match local_path.filter(|p| !p.is_empty()) {
            Some(path) => path,
            None => guard("cp_out", remote::default_name(container_path))?,
        };
        let target = guard("cp_out", self.inner.outbound.resolve(local))?;

        let environment = self.inner.environment.clone();
        self.inner
            .context
            .scope(session_id, self.default_policy(), move |workspace| async move {
                let source = workspace.resolve(container_path)?;
                environment.copy_out(&source, &target).await?;
                Ok(format!(
                    "Copied container:{source} to host:{}",
                    target.display()
                ))
            })
            .await
    }

    /// Creates or overwrites a file in the session workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if `container_path` leaves the workspace, no session
    /// can be resolved, or the environment fails.
    #[instrument(skip(self, content))]
    pub async fn edit_file(
        &self,
        container_path: &str,
        content: &str,
        session_id: Option<&str>,
    ) -> Result<String, SessionError> {
        guard("edit_file", remote::validate(container_path))?;

        let environment = self.inner.environment.clone();
        self.inner
            .context
            .scope(session_id, self.default_policy(), move |workspace| async move {
                let path = workspace.resolve(container_path)?;
                let output = environment.write_bytes(&path, content.as_bytes()).await?;
                Ok(render(&output))
            })
            .await
    }

    /// Lists the Python packages installed in the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be started or reached.
    #[instrument(skip(self))]
    pub async fn list_packages(&self) -> Result<String, SessionError> {
        self.inner.environment.ensure_ready().await?;
        let output = self.inner.environment.exec(&["pip", "list"], None).await?;
        Ok(render(&output))
    }

    /// Removes every session, clears the current pointer and recreates the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be recreated. Sessions are
    /// gone either way.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<String, SessionError> {
        let removed = self.inner.registry.clear().await;
        self.inner.current.set(None).await;
        log_audit(&AuditEvent::EnvironmentReset {
            sessions_removed: removed.len(),
        });
        Ok(self.inner.environment.reset().await?)
    }

    /// Closes a session and removes its workspace. Closing an id that is no
    /// longer registered succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionRequired`] for an empty id and
    /// [`SessionError::UnknownSession`] for a malformed one.
    #[instrument(skip(self))]
    pub async fn close_session(&self, session_id: &str) -> Result<String, SessionError> {
        let raw = session_id.trim();
        if raw.is_empty() {
            return Err(SessionError::SessionRequired);
        }
        let id = SessionId::parse(raw)
            .ok_or_else(|| SessionError::UnknownSession(raw.to_string()))?;
        self.inner.registry.remove(&id).await;
        self.inner.current.clear_if(&id).await;
        Ok(format!("closed {id}"))
    }

    /// The current session id, or an empty string if there is none.
    pub async fn get_current_session(&self) -> String {
        self.inner
            .current
            .get()
            .await
            .map(|id| id.to_string())
            .unwrap_or_default()
    }

    /// Closes the current session.
    #[instrument(skip(self))]
    pub async fn close_current_session(&self) -> String {
        let Some(id) = self.inner.current.get().await else {
            return "no current session".to_string();
        };
        self.inner.registry.remove(&id).await;
        self.inner.current.set(None).await;
        format!("closed {id}")
    }

    /// Every live session, oldest first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let current = self.inner.current.get().await;
        self.inner
            .registry
            .snapshot()
            .into_iter()
            .map(|(id, record)| SessionSummary {
                current: current.as_ref() == Some(&id),
                session_id: id,
                created_at: record.created_at(),
                last_used_at: record.last_used_at(),
            })
            .collect()
    }
}

/// Audits and converts a path validation failure.
fn guard<T>(operation: &str, result: Result<T, PathEscapeError>) -> Result<T, SessionError> {
    result.map_err(|e| {
        warn!(operation, error = %e, "Path rejected");
        log_audit(&AuditEvent::PathDenied {
            operation: operation.to_string(),
            path: e.offending_path(),
        });
        SessionError::PathEscape(e)
    })
}

//! Persistence strategies for the current-session pointer.
//!
//! With [`MarkerFileStore`] the pointer is mirrored into the execution
//! environment, so a restarted kernel can pick up the session it was using as
//! long as the environment itself survived.

use async_trait::async_trait;
use std::sync::Arc;

use super::types::SessionId;
use crate::environment::{EnvironmentError, ExecutionEnvironment};

/// File name of the current-session marker under the session base directory.
pub const CURRENT_MARKER: &str = ".current";
/// File name of the per-session last-use marker inside each workspace.
pub const LAST_USED_MARKER: &str = ".last_used";

/// Where the current-session pointer is mirrored.
#[async_trait]
pub trait CurrentSessionStore: Send + Sync + std::fmt::Debug {
    /// Mirrors `id`, or clears the mirror when `None`.
    async fn save(&self, id: Option<&SessionId>) -> Result<(), EnvironmentError>;

    /// The mirrored id, if any.
    async fn load(&self) -> Option<SessionId>;

    /// Last-use time of `id` as recorded outside this process.
    async fn last_used(&self, id: &SessionId) -> Option<f64>;

    /// Records that `id` was used at `at`.
    async fn record_use(&self, id: &SessionId, at: f64) -> Result<(), EnvironmentError>;
}

/// Keeps the pointer in memory only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

#[async_trait]
impl CurrentSessionStore for NoPersistence {
    async fn save(&self, _id: Option<&SessionId>) -> Result<(), EnvironmentError> {
        Ok(())
    }

    async fn load(&self) -> Option<SessionId> {
        None
    }

    async fn last_used(&self, _id: &SessionId) -> Option<f64> {
        None
    }

    async fn record_use(&self, _id: &SessionId, _at: f64) -> Result<(), EnvironmentError> {
        Ok(())
    }
}

/// Marker files inside the execution environment.
///
/// `{base_dir}/.current` holds the current id; `{base_dir}/{id}/.last_used`
/// holds the last-use timestamp of each session. When the latter is missing
/// the workspace directory's modification time is used instead.
#[derive(Debug)]
pub struct MarkerFileStore {
    environment: Arc<dyn ExecutionEnvironment>,
    base_dir: String,
}

impl MarkerFileStore {
    /// Creates a store rooted at the session base directory.
    #[must_use]
    pub fn new(environment: Arc<dyn ExecutionEnvironment>, base_dir: &str) -> Self {
        Self {
            environment,
            base_dir: base_dir.trim_end_matches('/').to_string(),
        }
    }

    fn current_marker(&self) -> String {
        format!("{}/{CURRENT_MARKER}", self.base_dir)
    }

    fn workspace(&self, id: &SessionId) -> String {
        format!("{}/{id}", self.base_dir)
    }

    fn last_used_marker(&self, id: &SessionId) -> String {
        format!("{}/{LAST_USED_MARKER}", self.workspace(id))
    }

    async fn write_checked(&self, path: &str, content: &[u8]) -> Result<(), EnvironmentError> {
        let output = self.environment.write_bytes(path, content).await?;
        if output.success() {
            Ok(())
        } else {
            Err(EnvironmentError::CommandFailed {
                command: format!("write {path}"),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}

#[async_trait]
impl CurrentSessionStore for MarkerFileStore {
    async fn save(&self, id: Option<&SessionId>) -> Result<(), EnvironmentError> {
        match id {
            Some(id) => {
                self.write_checked(&self.current_marker(), id.as_str().as_bytes())
                    .await
            }
            None => self.environment.remove_file(&self.current_marker()).await,
        }
    }

    async fn load(&self) -> Option<SessionId> {
        let content = self
            .environment
            .read_bytes(&self.current_marker())
            .await
            .ok()?;
        SessionId::parse(&String::from_utf8_lossy(&content))
    }

    async fn last_used(&self, id: &SessionId) -> Option<f64> {
        if let Ok(content) = self.environment.read_bytes(&self.last_used_marker(id)).await {
            if let Ok(at) = String::from_utf8_lossy(&content).trim().parse::<f64>() {
                return Some(at);
            }
        }
        self.environment
            .modified_at(&self.workspace(id))
            .await
            .ok()
            .flatten()
    }

    async fn record_use(&self, id: &SessionId, at: f64) -> Result<(), EnvironmentError> {
        self.write_checked(&self.last_used_marker(id), at.to_string().as_bytes())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;

    const BASE: &str = "/workspace/sessions";

    #[tokio::test]
    async fn test_save_load_and_clear() -> anyhow::Result<()> {
        let env = Arc::new(MemoryEnvironment::new());
        let store = MarkerFileStore::new(env.clone(), BASE);
        let id = SessionId::generate();

        store.save(Some(&id)).await?;
        assert_eq!(store.load().await, Some(id.clone()));
        assert_eq!(
            env.file("/workspace/sessions/.current"),
            Some(id.as_str().as_bytes().to_vec())
        );

        store.save(None).await?;
        assert_eq!(store.load().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_garbage_marker_is_ignored() -> anyhow::Result<()> {
        let env = Arc::new(MemoryEnvironment::new());
        env.write_bytes("/workspace/sessions/.current", b"../../etc")
            .await?;
        let store = MarkerFileStore::new(env, BASE);
        assert_eq!(store.load().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_last_used_prefers_marker_then_mtime() -> anyhow::Result<()> {
        let env = Arc::new(MemoryEnvironment::new());
        let store = MarkerFileStore::new(env.clone(), BASE);
        let id = SessionId::generate();
        let workspace = format!("{BASE}/{id}");
        env.make_dir(&workspace).await?;

        assert_eq!(store.last_used(&id).await, None);

        env.set_modified_at(&workspace, 10.0);
        assert_eq!(store.last_used(&id).await, Some(10.0));

        store.record_use(&id, 1_234.5).await?;
        assert_eq!(store.last_used(&id).await, Some(1_234.5));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_persistence_forgets_everything() -> anyhow::Result<()> {
        let store = NoPersistence;
        let id = SessionId::generate();
        store.save(Some(&id)).await?;
        store.record_use(&id, 1.0).await?;
        assert_eq!(store.load().await, None);
        assert_eq!(store.last_used(&id).await, None);
        Ok(())
    }
}

//! The execution environment sessions live in.
//!
//! The kernel never talks to Docker directly; everything goes through
//! [`ExecutionEnvironment`], which backends implement in full.

pub mod docker;
pub mod memory;

pub use docker::DockerEnvironment;
pub use memory::MemoryEnvironment;

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Output of a command run inside the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code (`-1` when killed by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures of the environment itself, as opposed to a failing user program.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// A command the kernel depends on exited non-zero.
    #[error("Command `{command}` failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        /// Command line that failed.
        command: String,
        /// Exit code returned.
        exit_code: i32,
        /// Raw diagnostic output.
        stderr: String,
    },
    /// A command did not finish within the configured bound.
    #[error("Command `{command}` timed out after {}s", after.as_secs())]
    Timeout {
        /// Command line that timed out.
        command: String,
        /// Bound that was exceeded.
        after: Duration,
    },
    /// The command could not be started at all.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line that could not start.
        command: String,
        /// Source error.
        #[source]
        source: std::io::Error,
    },
}

/// Capabilities the session layer needs from the sandbox runtime.
///
/// Paths on the environment side are absolute posix paths; callers validate
/// them before invoking any method here.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Brings the shared environment to a running state. Idempotent.
    async fn ensure_ready(&self) -> Result<(), EnvironmentError>;

    /// Destroys and recreates the environment, returning a progress report.
    async fn reset(&self) -> Result<String, EnvironmentError>;

    /// Creates a directory and its parents.
    async fn make_dir(&self, path: &str) -> Result<(), EnvironmentError>;

    /// Removes a directory tree.
    async fn remove_dir(&self, path: &str) -> Result<(), EnvironmentError>;

    /// Removes a single file; a missing file is not an error.
    async fn remove_file(&self, path: &str) -> Result<(), EnvironmentError>;

    /// Writes `content` to `path`, creating parent directories.
    async fn write_bytes(&self, path: &str, content: &[u8])
        -> Result<CommandOutput, EnvironmentError>;

    /// Reads the full content of `path`.
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, EnvironmentError>;

    /// Modification time of `path` in seconds since the epoch, if known.
    async fn modified_at(&self, path: &str) -> Result<Option<f64>, EnvironmentError>;

    /// Runs Python source fed on stdin with `workdir` as working directory.
    async fn run_code(&self, code: &str, workdir: &str) -> Result<CommandOutput, EnvironmentError>;

    /// Runs a Python script that already exists in the environment.
    async fn run_file(&self, path: &str, workdir: &str) -> Result<CommandOutput, EnvironmentError>;

    /// Runs an arbitrary argv.
    async fn exec(
        &self,
        argv: &[&str],
        workdir: Option<&str>,
    ) -> Result<CommandOutput, EnvironmentError>;

    /// Copies a host file into the environment.
    async fn copy_in(&self, host: &Path, remote: &str) -> Result<(), EnvironmentError>;

    /// Copies a file out of the environment onto the host.
    async fn copy_out(&self, remote: &str, host: &Path) -> Result<(), EnvironmentError>;
}

/// Creates the host-side parent directory of a download target.
pub(crate) async fn ensure_host_parent(host: &Path) -> std::io::Result<()> {
    match host.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

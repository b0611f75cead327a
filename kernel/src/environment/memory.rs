//! In-process execution environment.
//!
//! Keeps directories and files in memory and never executes anything: code
//! and script runs echo what would have run. Used by the test suites and by
//! the `memory` backend for dry runs without Docker.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{CommandOutput, EnvironmentError, ExecutionEnvironment};

#[derive(Debug, Default)]
struct Filesystem {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    mtimes: BTreeMap<String, f64>,
}

impl Filesystem {
    fn add_dir_all(&mut self, path: &str) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            self.dirs.insert(current.clone());
        }
    }

    fn add_parent(&mut self, path: &str) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_dir_all(parent);
        }
    }
}

/// Recorded call, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `run_code(code, workdir)`
    RunCode {
        /// Code fed on stdin.
        code: String,
        /// Working directory.
        workdir: String,
    },
    /// `run_file(path, workdir)`
    RunFile {
        /// Script path.
        path: String,
        /// Working directory.
        workdir: String,
    },
    /// `exec(argv, workdir)`
    Exec {
        /// Command line.
        argv: Vec<String>,
    },
    /// `copy_in(host, remote)`
    CopyIn {
        /// Host source.
        host: String,
        /// Environment destination.
        remote: String,
    },
    /// `copy_out(remote, host)`
    CopyOut {
        /// Environment source.
        remote: String,
        /// Host destination.
        host: String,
    },
}

/// Callback run at the start of every `remove_dir`.
struct RemoveHook(Box<dyn Fn(&str) + Send + Sync>);

impl std::fmt::Debug for RemoveHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RemoveHook")
    }
}

/// Environment held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    on_remove_dir: Mutex<Option<RemoveHook>>,
    fs: Mutex<Filesystem>,
    calls: Mutex<Vec<Call>>,
    ready_calls: AtomicUsize,
    resets: AtomicUsize,
    fail_make_dir: AtomicBool,
    fail_remove_dir: AtomicBool,
}

impl MemoryEnvironment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `make_dir` fail.
    pub fn fail_make_dir(&self, fail: bool) {
        self.fail_make_dir.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `remove_dir` fail.
    pub fn fail_remove_dir(&self, fail: bool) {
        self.fail_remove_dir.store(fail, Ordering::SeqCst);
    }

    /// Runs `hook` with the path at the start of every `remove_dir`, letting
    /// tests interleave work with a removal in flight.
    pub fn on_remove_dir(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_remove_dir.lock() = Some(RemoveHook(Box::new(hook)));
    }

    /// Whether `path` exists as a directory.
    #[must_use]
    pub fn has_dir(&self, path: &str) -> bool {
        self.fs.lock().dirs.contains(path)
    }

    /// Content of `path`, if it exists.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().files.get(path).cloned()
    }

    /// Overrides the modification time reported for `path`.
    pub fn set_modified_at(&self, path: &str, secs: f64) {
        self.fs.lock().mtimes.insert(path.to_string(), secs);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of `ensure_ready` calls.
    #[must_use]
    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }

    /// Number of `reset` calls.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

fn failed(command: &str, stderr: impl Into<String>) -> EnvironmentError {
    EnvironmentError::CommandFailed {
        command: command.to_string(),
        exit_code: 1,
        stderr: stderr.into(),
    }
}

fn io_error(command: String, source: std::io::Error) -> EnvironmentError {
    EnvironmentError::Spawn { command, source }
}

#[async_trait]
impl ExecutionEnvironment for MemoryEnvironment {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_ready(&self) -> Result<(), EnvironmentError> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> Result<String, EnvironmentError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        *self.fs.lock() = Filesystem::default();
        Ok("reset".to_string())
    }

    async fn make_dir(&self, path: &str) -> Result<(), EnvironmentError> {
        if self.fail_make_dir.load(Ordering::SeqCst) {
            return Err(failed("mkdir", format!("mkdir: cannot create directory '{path}'")));
        }
        self.fs.lock().add_dir_all(path);
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<(), EnvironmentError> {
        if let Some(hook) = self.on_remove_dir.lock().as_ref() {
            (hook.0)(path);
        }
        if self.fail_remove_dir.load(Ordering::SeqCst) {
            return Err(failed("rm", format!("rm: cannot remove '{path}'")));
        }
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut fs = self.fs.lock();
        fs.dirs.retain(|d| d != path && !d.starts_with(&prefix));
        fs.files.retain(|f, _| !f.starts_with(&prefix));
        fs.mtimes.retain(|m, _| m != path && !m.starts_with(&prefix));
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), EnvironmentError> {
        self.fs.lock().files.remove(path);
        Ok(())
    }

    async fn write_bytes(
        &self,
        path: &str,
        content: &[u8],
    ) -> Result<CommandOutput, EnvironmentError> {
        let mut fs = self.fs.lock();
        fs.add_parent(path);
        fs.files.insert(path.to_string(), content.to_vec());
        Ok(CommandOutput::default())
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, EnvironmentError> {
        self.fs
            .lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| failed("cat", format!("cat: {path}: No such file or directory")))
    }

    async fn modified_at(&self, path: &str) -> Result<Option<f64>, EnvironmentError> {
        Ok(self.fs.lock().mtimes.get(path).copied())
    }

    async fn run_code(&self, code: &str, workdir: &str) -> Result<CommandOutput, EnvironmentError> {
        self.record(Call::RunCode {
            code: code.to_string(),
            workdir: workdir.to_string(),
        });
        Ok(CommandOutput {
            stdout: format!("exec in {workdir}"),
            ..CommandOutput::default()
        })
    }

    async fn run_file(&self, path: &str, workdir: &str) -> Result<CommandOutput, EnvironmentError> {
        self.record(Call::RunFile {
            path: path.to_string(),
            workdir: workdir.to_string(),
        });
        if !self.fs.lock().files.contains_key(path) {
            return Ok(CommandOutput {
                stderr: format!(
                    "python: can't open file '{path}': [Errno 2] No such file or directory"
                ),
                exit_code: 2,
                ..CommandOutput::default()
            });
        }
        Ok(CommandOutput {
            stdout: format!("exec file {path} in {workdir}"),
            ..CommandOutput::default()
        })
    }

    async fn exec(
        &self,
        argv: &[&str],
        _workdir: Option<&str>,
    ) -> Result<CommandOutput, EnvironmentError> {
        self.record(Call::Exec {
            argv: argv.iter().map(|s| (*s).to_string()).collect(),
        });
        Ok(CommandOutput::default())
    }

    async fn copy_in(&self, host: &Path, remote: &str) -> Result<(), EnvironmentError> {
        self.record(Call::CopyIn {
            host: host.display().to_string(),
            remote: remote.to_string(),
        });
        let content = tokio::fs::read(host)
            .await
            .map_err(|e| io_error(format!("read {}", host.display()), e))?;
        let mut fs = self.fs.lock();
        fs.add_parent(remote);
        fs.files.insert(remote.to_string(), content);
        Ok(())
    }

    async fn copy_out(&self, remote: &str, host: &Path) -> Result<(), EnvironmentError> {
        self.record(Call::CopyOut {
            remote: remote.to_string(),
            host: host.display().to_string(),
        });
        let content = self
            .fs
            .lock()
            .files
            .get(remote)
            .cloned()
            .ok_or_else(|| failed("cp", format!("Could not find the file {remote} in container")))?;
        super::ensure_host_parent(host)
            .await
            .map_err(|e| io_error(format!("create {}", host.display()), e))?;
        tokio::fs::write(host, content)
            .await
            .map_err(|e| io_error(format!("write {}", host.display()), e))
    }
}

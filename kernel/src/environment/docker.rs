//! Docker-backed execution environment.
//!
//! A single long-lived container hosts every session. All interaction goes
//! through the docker CLI; arguments are passed as argv so no path or code is
//! ever interpolated into a shell string.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{CommandOutput, EnvironmentError, ExecutionEnvironment};
use crate::infrastructure::config::DockerSettings;

/// Writes stdin to `$1`, creating its parent directory first.
const WRITE_SCRIPT: &str = r#"mkdir -p "$(dirname "$1")" && cat > "$1""#;

/// Shared container driven through the docker CLI.
#[derive(Debug)]
pub struct DockerEnvironment {
    settings: DockerSettings,
    startup: tokio::sync::Mutex<()>,
}

impl DockerEnvironment {
    /// Creates a handle; the container is started lazily by `ensure_ready`.
    #[must_use]
    pub fn new(settings: DockerSettings) -> Self {
        Self {
            settings,
            startup: tokio::sync::Mutex::new(()),
        }
    }

    fn container(&self) -> &str {
        &self.settings.container_name
    }

    /// `docker run` argv for a fresh container.
    fn run_args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.container().to_string(),
            "-w".to_string(),
            "/workspace".to_string(),
            self.settings.image.clone(),
            "tail".to_string(),
            "-f".to_string(),
            "/dev/null".to_string(),
        ]
    }

    /// `docker exec` argv running `argv` inside the container.
    fn exec_args(&self, argv: &[&str], workdir: Option<&str>, interactive: bool) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if interactive {
            args.push("-i".to_string());
        }
        if let Some(dir) = workdir {
            args.extend(["-w".to_string(), dir.to_string()]);
        }
        args.push(self.container().to_string());
        args.extend(argv.iter().map(|s| (*s).to_string()));
        args
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.settings.binary, args.join(" "))
    }

    /// Runs the docker CLI and returns its raw output.
    ///
    /// Feeding stdin and collecting output share one deadline, so a child
    /// that stops reading its input still times out.
    async fn invoke(
        &self,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<Output, EnvironmentError> {
        let command = self.command_line(args);
        debug!(command = %command, "docker invocation");

        let mut child = Command::new(&self.settings.binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EnvironmentError::Spawn {
                command: command.clone(),
                source: e,
            })?;

        let feed = stdin.zip(child.stdin.take());
        let write_input = async move {
            let Some((input, mut pipe)) = feed else {
                return Ok(());
            };
            let written = async {
                pipe.write_all(input).await?;
                pipe.shutdown().await
            }
            .await;
            match written {
                // The child exited without draining stdin; its status tells the rest
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let run = async move {
            let ((), output) = tokio::try_join!(write_input, child.wait_with_output())?;
            Ok::<_, std::io::Error>(output)
        };

        let timeout = self.settings.command_timeout();
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(EnvironmentError::Spawn { command, source: e }),
            Err(_) => {
                warn!(command = %command, "docker invocation timed out");
                Err(EnvironmentError::Timeout {
                    command,
                    after: timeout,
                })
            }
        }
    }

    /// Runs the docker CLI, returning its output whatever the exit code.
    async fn docker(
        &self,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, EnvironmentError> {
        let output = self.invoke(args, stdin).await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Like [`Self::docker`] but a non-zero exit is an error.
    async fn docker_checked(
        &self,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, EnvironmentError> {
        let output = self.docker(args, stdin).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(EnvironmentError::CommandFailed {
                command: self.command_line(args),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    async fn list_containers(&self, all: bool) -> Result<bool, EnvironmentError> {
        let mut args = vec!["ps".to_string()];
        if all {
            args.push("-a".to_string());
        }
        args.extend([
            "--filter".to_string(),
            format!("name={}", self.container()),
            "--format".to_string(),
            "{{.Names}}".to_string(),
        ]);
        let output = self.docker_checked(&args, None).await?;
        Ok(output.stdout.lines().any(|name| name == self.container()))
    }

    /// Creates or starts the container. Caller holds the startup lock.
    async fn init_container(&self) -> Result<String, EnvironmentError> {
        let mut messages = Vec::new();

        if self.list_containers(true).await? {
            if self.list_containers(false).await? {
                messages.push(format!("Container '{}' is already running.", self.container()));
                return Ok(messages.join("\n"));
            }
            messages.push(format!("Starting existing container '{}'.", self.container()));
            self.docker_checked(&["start".to_string(), self.container().to_string()], None)
                .await?;
        } else {
            messages.push(format!(
                "Creating and starting container '{}'.",
                self.container()
            ));
            self.docker_checked(&self.run_args(), None).await?;
        }

        if !self.settings.bootstrap_packages.is_empty() {
            messages.push(format!(
                "Installing {} inside container...",
                self.settings.bootstrap_packages.join(", ")
            ));
            let mut argv = vec![self.settings.python.as_str(), "-m", "pip", "install"];
            argv.extend(self.settings.bootstrap_packages.iter().map(String::as_str));
            self.docker_checked(&self.exec_args(&argv, None, false), None)
                .await?;
        }

        info!(container = %self.container(), "Container ready");
        Ok(messages.join("\n"))
    }
}

#[async_trait]
impl ExecutionEnvironment for DockerEnvironment {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn ensure_ready(&self) -> Result<(), EnvironmentError> {
        let _guard = self.startup.lock().await;
        if self.list_containers(false).await? {
            return Ok(());
        }
        self.init_container().await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> Result<String, EnvironmentError> {
        let _guard = self.startup.lock().await;
        let mut messages = Vec::new();
        if self.list_containers(true).await? {
            messages.push(format!("Removing container '{}'...", self.container()));
            self.docker_checked(
                &["rm".to_string(), "-f".to_string(), self.container().to_string()],
                None,
            )
            .await?;
        }
        messages.push(self.init_container().await?);
        Ok(messages.join("\n"))
    }

    async fn make_dir(&self, path: &str) -> Result<(), EnvironmentError> {
        self.docker_checked(&self.exec_args(&["mkdir", "-p", path], None, false), None)
            .await
            .map(|_| ())
    }

    async fn remove_dir(&self, path: &str) -> Result<(), EnvironmentError> {
        self.docker_checked(&self.exec_args(&["rm", "-rf", path], None, false), None)
            .await
            .map(|_| ())
    }

    async fn remove_file(&self, path: &str) -> Result<(), EnvironmentError> {
        self.docker_checked(&self.exec_args(&["rm", "-f", path], None, false), None)
            .await
            .map(|_| ())
    }

    async fn write_bytes(
        &self,
        path: &str,
        content: &[u8],
    ) -> Result<CommandOutput, EnvironmentError> {
        let argv = ["sh", "-c", WRITE_SCRIPT, "sh", path];
        self.docker(&self.exec_args(&argv, None, true), Some(content))
            .await
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, EnvironmentError> {
        let args = self.exec_args(&["cat", path], None, false);
        let output = self.invoke(&args, None).await?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(EnvironmentError::CommandFailed {
                command: self.command_line(&args),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn modified_at(&self, path: &str) -> Result<Option<f64>, EnvironmentError> {
        let output = self
            .docker(&self.exec_args(&["stat", "-c", "%Y", path], None, false), None)
            .await?;
        if !output.success() {
            return Ok(None);
        }
        Ok(parse_mtime(&output.stdout))
    }

    async fn run_code(&self, code: &str, workdir: &str) -> Result<CommandOutput, EnvironmentError> {
        let argv = [self.settings.python.as_str()];
        self.docker(&self.exec_args(&argv, Some(workdir), true), Some(code.as_bytes()))
            .await
    }

    async fn run_file(&self, path: &str, workdir: &str) -> Result<CommandOutput, EnvironmentError> {
        let argv = [self.settings.python.as_str(), path];
        self.docker(&self.exec_args(&argv, Some(workdir), false), None)
            .await
    }

    async fn exec(
        &self,
        argv: &[&str],
        workdir: Option<&str>,
    ) -> Result<CommandOutput, EnvironmentError> {
        self.docker(&self.exec_args(argv, workdir, false), None).await
    }

    async fn copy_in(&self, host: &Path, remote: &str) -> Result<(), EnvironmentError> {
        let args = [
            "cp".to_string(),
            host.display().to_string(),
            format!("{}:{remote}", self.container()),
        ];
        self.docker_checked(&args, None).await.map(|_| ())
    }

    async fn copy_out(&self, remote: &str, host: &Path) -> Result<(), EnvironmentError> {
        super::ensure_host_parent(host)
            .await
            .map_err(|e| EnvironmentError::Spawn {
                command: format!("create {}", host.display()),
                source: e,
            })?;
        let args = [
            "cp".to_string(),
            format!("{}:{remote}", self.container()),
            host.display().to_string(),
        ];
        self.docker_checked(&args, None).await.map(|_| ())
    }
}

/// Parses `stat -c %Y` output; `0` means the time is unknown.
fn parse_mtime(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment() -> DockerEnvironment {
        DockerEnvironment::new(DockerSettings {
            image: "test-image".to_string(),
            ..DockerSettings::default()
        })
    }

    #[test]
    fn test_run_args_keep_container_alive() {
        let args = environment().run_args();
        assert_eq!(
            args,
            [
                "run",
                "-d",
                "--name",
                "mcp-code-interpreter",
                "-w",
                "/workspace",
                "test-image",
                "tail",
                "-f",
                "/dev/null"
            ]
        );
    }

    #[test]
    fn test_exec_args_with_workdir_and_stdin() {
        let args = environment().exec_args(&["python"], Some("/workspace/sessions/abc"), true);
        assert_eq!(
            args,
            [
                "exec",
                "-i",
                "-w",
                "/workspace/sessions/abc",
                "mcp-code-interpreter",
                "python"
            ]
        );
    }

    #[test]
    fn test_write_passes_path_as_positional_argument() {
        let env = environment();
        let args = env.exec_args(
            &["sh", "-c", WRITE_SCRIPT, "sh", "/workspace/it's here.txt"],
            None,
            true,
        );
        assert_eq!(args[..3], ["exec", "-i", "mcp-code-interpreter"]);
        assert_eq!(args.last().map(String::as_str), Some("/workspace/it's here.txt"));
        assert!(!args[5].contains("it's here"));
    }

    #[test]
    fn test_parse_mtime() {
        assert_eq!(parse_mtime("1700000000\n"), Some(1_700_000_000.0));
        assert_eq!(parse_mtime("0"), None);
        assert_eq!(parse_mtime("stat: cannot stat"), None);
    }

    /// Writes an executable stand-in for the docker CLI.
    #[cfg(unix)]
    fn fake_docker(dir: &Path, body: &str) -> anyhow::Result<String> {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path.display().to_string())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_covers_unread_stdin() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = DockerEnvironment::new(DockerSettings {
            binary: fake_docker(dir.path(), "exec sleep 30")?,
            command_timeout_secs: 1,
            ..DockerSettings::default()
        });

        // Far larger than any pipe buffer
        let payload = vec![b'x'; 4 * 1024 * 1024];
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            env.write_bytes("/workspace/f", &payload),
        )
        .await?;

        assert!(
            matches!(result, Err(EnvironmentError::Timeout { .. })),
            "{result:?}"
        );
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_bytes_keeps_non_utf8_content() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = DockerEnvironment::new(DockerSettings {
            binary: fake_docker(dir.path(), r"printf '\377\376ok'")?,
            ..DockerSettings::default()
        });

        let bytes = env.read_bytes("/workspace/blob.bin").await?;
        assert_eq!(bytes, [0xff, 0xfe, b'o', b'k']);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_bytes_failure_keeps_stderr() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = DockerEnvironment::new(DockerSettings {
            binary: fake_docker(dir.path(), "echo 'No such file' >&2; exit 1")?,
            ..DockerSettings::default()
        });

        let err = env.read_bytes("/workspace/absent").await.unwrap_err();
        match err {
            EnvironmentError::CommandFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "No such file");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let env = DockerEnvironment::new(DockerSettings {
            binary: "/nonexistent/docker-binary".to_string(),
            ..DockerSettings::default()
        });
        let err = env.make_dir("/workspace/x").await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Spawn { .. }));
    }
}

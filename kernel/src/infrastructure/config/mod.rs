//! Configuration management for the kernel.
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional TOML file, `PYEXEC__SECTION__KEY` environment variables, and
//! command-line overrides. They are read once at startup.
//!
//! # Example
//!
//! ```no_run
//! use pyexec_kernel::infrastructure::config::{ConfigOverrides, Settings};
//!
//! let settings = Settings::load(&ConfigOverrides::default()).expect("Failed to load configuration");
//! ```

pub mod docker;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod workdirs;

pub use docker::{Backend, DockerSettings};
pub use server::ServerSettings;
pub use session::SessionSettings;
pub use telemetry::TelemetrySettings;
pub use workdirs::WorkdirSettings;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Default configuration file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pyexec.toml";

/// Top-level configuration for the kernel.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Server settings.
    pub server: ServerSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
    /// Execution environment settings.
    #[serde(default)]
    pub docker: DockerSettings,
    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionSettings,
    /// Host transfer directories.
    pub workdirs: WorkdirSettings,
}

/// Values supplied on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Configuration file to read instead of [`DEFAULT_CONFIG_FILE`].
    pub config_file: Option<PathBuf>,
    /// Upload root.
    pub workdir_in: Option<PathBuf>,
    /// Download root.
    pub workdir_out: Option<PathBuf>,
}

impl Settings {
    /// Builds settings from defaults, the config file, the environment and
    /// `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::Message(format!("cannot determine working directory: {e}")))?;
        let config_file = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let s = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9090)?
            .set_default("telemetry.service_name", "pyexec-kernel")?
            .set_default("telemetry.sampling_ratio", 1.0)?
            .set_default("workdirs.base", cwd.to_string_lossy().to_string())?
            .add_source(File::from(config_file).required(false))
            // Merge in Environment variables
            .add_source(
                Environment::with_prefix("PYEXEC")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("docker.bootstrap_packages"),
            )
            .set_override_option("workdirs.input", path_value(overrides.workdir_in.as_ref()))?
            .set_override_option("workdirs.output", path_value(overrides.workdir_out.as_ref()))?
            .build()?;

        s.try_deserialize()
    }
}

fn path_value(path: Option<&PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_values_and_cli_overrides() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("pyexec.toml");
        std::fs::write(
            &file,
            r#"
[server]
port = 7070

[session]
ttl_secs = 30
max_sessions = 4
persist_current = true

[docker]
backend = "memory"
image = "python:3.12-slim"

[workdirs]
input = "/from/file"
"#,
        )?;

        let settings = Settings::load(&ConfigOverrides {
            config_file: Some(file),
            workdir_in: Some(PathBuf::from("/from/cli")),
            workdir_out: None,
        })?;

        assert_eq!(settings.server.port, 7070);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.session.ttl_secs, 30);
        assert_eq!(settings.session.max_sessions, 4);
        assert!(settings.session.persist_current);
        assert_eq!(settings.session.base_dir, "/workspace/sessions");
        assert_eq!(settings.docker.backend, Backend::Memory);
        assert_eq!(settings.docker.image, "python:3.12-slim");
        assert_eq!(settings.docker.container_name, "mcp-code-interpreter");
        assert_eq!(settings.workdirs.input_dir(), PathBuf::from("/from/cli"));
        assert_eq!(settings.workdirs.output_dir(), settings.workdirs.base);
        Ok(())
    }

    #[test]
    fn test_missing_file_uses_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let settings = Settings::load(&ConfigOverrides {
            config_file: Some(dir.path().join("absent.toml")),
            ..ConfigOverrides::default()
        })?;

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.telemetry.service_name, "pyexec-kernel");
        assert_eq!(settings.session.ttl_secs, 600);
        assert_eq!(settings.session.max_sessions, 32);
        assert_eq!(settings.session.janitor_interval_secs, 60);
        assert!(!settings.session.require_explicit);
        assert_eq!(settings.docker.backend, Backend::Docker);
        assert_eq!(settings.workdirs.base, std::env::current_dir()?);
        Ok(())
    }
}

//! Execution environment configuration.
//!
//! Selects the backend and describes the shared Docker container that hosts
//! every session workspace.

use serde::Deserialize;
use std::time::Duration;

/// Which [`ExecutionEnvironment`](crate::environment::ExecutionEnvironment) to run against.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A long-lived Docker container driven through the docker CLI.
    #[default]
    Docker,
    /// In-process environment; nothing is executed.
    Memory,
}

/// Docker container settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DockerSettings {
    /// Backend selection (default: docker)
    #[serde(default)]
    pub backend: Backend,

    /// Docker CLI binary (default: "docker")
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Name of the shared container (default: "mcp-code-interpreter")
    #[serde(default = "default_container_name")]
    pub container_name: String,

    /// Image the container is created from (default: "python:3.10-slim")
    #[serde(default = "default_image")]
    pub image: String,

    /// Interpreter used for code and scripts (default: "python")
    #[serde(default = "default_python")]
    pub python: String,

    /// Packages pip-installed when the container is first created (default: none)
    #[serde(default)]
    pub bootstrap_packages: Vec<String>,

    /// Upper bound for any single docker invocation in seconds (default: 120)
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl DockerSettings {
    /// Timeout applied to every docker invocation.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            binary: default_binary(),
            container_name: default_container_name(),
            image: default_image(),
            python: default_python(),
            bootstrap_packages: Vec::new(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

fn default_binary() -> String {
    "docker".to_string()
}

fn default_container_name() -> String {
    "mcp-code-interpreter".to_string()
}

fn default_image() -> String {
    "python:3.10-slim".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_command_timeout_secs() -> u64 {
    120
}

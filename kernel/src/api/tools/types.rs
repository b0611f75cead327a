//! Request/Response Types for the tool API.

use serde::{Deserialize, Serialize};

/// Request to run Python source.
#[derive(Debug, Clone, Deserialize)]
pub struct RunCodeRequest {
    /// Source fed to the interpreter on stdin.
    pub code: String,
    /// Session to run in; the current session when omitted.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request to run Python source in a one-shot session.
#[derive(Debug, Clone, Deserialize)]
pub struct RunEphemeralRequest {
    /// Source fed to the interpreter on stdin.
    pub code: String,
}

/// Request to run a script from the session workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct RunFileRequest {
    /// Script path relative to the workspace.
    pub path: String,
    /// Session to run in.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request to copy a host file into a session workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    /// Source path relative to the upload root.
    pub local_path: String,
    /// Destination relative to the workspace; the source file name when omitted.
    #[serde(default)]
    pub container_path: Option<String>,
    /// Target session.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request to copy a workspace file onto the host.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    /// Source path relative to the workspace.
    pub container_path: String,
    /// Destination relative to the download root; the source file name when omitted.
    #[serde(default)]
    pub local_path: Option<String>,
    /// Source session.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request to create or overwrite a workspace file.
#[derive(Debug, Clone, Deserialize)]
pub struct EditFileRequest {
    /// Path relative to the workspace.
    pub container_path: String,
    /// New file content.
    pub content: String,
    /// Target session.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Rendered output of a tool operation.
#[derive(Debug, Clone, Serialize)]
pub struct OutputResponse {
    /// Human-readable report.
    pub output: String,
}

impl From<String> for OutputResponse {
    fn from(output: String) -> Self {
        Self { output }
    }
}

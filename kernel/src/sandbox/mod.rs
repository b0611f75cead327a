//! Path confinement for both sides of the sandbox boundary.
//!
//! Host paths (upload sources, download targets) are checked by [`HostPolicy`]
//! against a configured root directory. Paths inside the execution environment
//! are checked by [`remote::resolve`] against a session workspace.

pub mod host;
pub mod remote;

pub use host::HostPolicy;

use std::path::PathBuf;
use thiserror::Error;

/// A caller-supplied path that would leave its root.
#[derive(Debug, Error)]
pub enum PathEscapeError {
    /// Absolute paths are not accepted inside the sandbox.
    #[error("Absolute path '{0}' is not allowed; use a path relative to the session workspace")]
    Absolute(String),
    /// `..` segments are not accepted inside the sandbox.
    #[error("Path '{0}' contains a '..' segment")]
    ParentSegment(String),
    /// A default destination was needed but the path has no file name.
    #[error("Path '{0}' does not name a file; give an explicit destination")]
    NoFileName(String),
    /// The path contains a NUL byte.
    #[error("Path contains a NUL byte")]
    NulByte,
    /// The resolved host path is outside the root.
    #[error("Security Violation: Path '{target:?}' is outside the authorized root '{root:?}'")]
    OutsideRoot {
        /// Resolved target path.
        target: PathBuf,
        /// Root the target had to stay under.
        root: PathBuf,
    },
    /// The host path could not be resolved.
    #[error("Invalid path '{path}': {source}")]
    InvalidPath {
        /// Path that failed to resolve.
        path: PathBuf,
        /// Source error.
        #[source]
        source: std::io::Error,
    },
}

impl PathEscapeError {
    /// The offending path, for audit records.
    #[must_use]
    pub fn offending_path(&self) -> String {
        match self {
            Self::Absolute(path) | Self::ParentSegment(path) | Self::NoFileName(path) => {
                path.clone()
            }
            Self::NulByte => String::from("<nul>"),
            Self::OutsideRoot { target, .. } => target.display().to_string(),
            Self::InvalidPath { path, .. } => path.display().to_string(),
        }
    }
}

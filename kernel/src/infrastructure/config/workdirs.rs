//! Host directories used for file transfer.
//!
//! Uploads are read from the input directory and downloads are written to the
//! output directory. Both fall back to `base` when unset.

use serde::Deserialize;
use std::path::PathBuf;

/// Host transfer roots.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkdirSettings {
    /// Fallback for both directions.
    pub base: PathBuf,
    /// Root for `cp_in` sources.
    pub input: Option<PathBuf>,
    /// Root for `cp_out` targets.
    pub output: Option<PathBuf>,
}

impl WorkdirSettings {
    /// Effective upload root.
    #[must_use]
    pub fn input_dir(&self) -> PathBuf {
        self.input.clone().unwrap_or_else(|| self.base.clone())
    }

    /// Effective download root.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.base.clone())
    }
}

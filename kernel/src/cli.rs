//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

use crate::infrastructure::config::ConfigOverrides;

/// Session-scoped Python execution kernel.
#[derive(Debug, Clone, Parser)]
#[command(name = "pyexec-kernel", version, about)]
pub struct Cli {
    /// Configuration file (TOML). Defaults to `pyexec.toml` when present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host directory uploads are read from.
    #[arg(long = "workdir-in", alias = "WORKDIR_IN", value_name = "DIR")]
    pub workdir_in: Option<PathBuf>,

    /// Host directory downloads are written to.
    #[arg(long = "workdir-out", alias = "WORKDIR_OUT", value_name = "DIR")]
    pub workdir_out: Option<PathBuf>,
}

impl Cli {
    /// Values that take precedence over every other configuration source.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            workdir_in: self.workdir_in.clone(),
            workdir_out: self.workdir_out.clone(),
        }
    }
}

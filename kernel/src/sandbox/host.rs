//! Host-side path policy for file transfers.
//!
//! Uploads read from, and downloads write to, a configured root directory on
//! the host. Every caller-supplied path is resolved against that root and must
//! stay inside it after `.`/`..` normalisation and symlink resolution.

use std::path::{Component, Path, PathBuf};

use super::PathEscapeError;

/// Confines host paths to a single root directory.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    root: PathBuf,
}

impl HostPolicy {
    /// Creates a policy rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be canonicalized (for example when
    /// it does not exist).
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathEscapeError> {
        let root = root.as_ref();
        let canonical = dunce::canonicalize(root).map_err(|e| PathEscapeError::InvalidPath {
            path: root.to_path_buf(),
            source: e,
        })?;
        Ok(Self { root: canonical })
    }

    /// The canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `relative` under the root.
    ///
    /// The target does not need to exist; its longest existing ancestor is
    /// canonicalized and the remaining components are appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved path is outside the root, or if an
    /// existing ancestor cannot be canonicalized.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathEscapeError> {
        if relative.contains('\0') {
            return Err(PathEscapeError::NulByte);
        }

        let normalized = normalize(&self.root.join(relative));
        let resolved = canonicalize_existing_prefix(&normalized)?;

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(PathEscapeError::OutsideRoot {
                target: resolved,
                root: self.root.clone(),
            })
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, PathEscapeError> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match dunce::canonicalize(existing) {
            Ok(mut canonical) => {
                for name in missing.iter().rev() {
                    canonical.push(name);
                }
                return Ok(canonical);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
                    return Err(PathEscapeError::InvalidPath {
                        path: path.to_path_buf(),
                        source: e,
                    });
                };
                missing.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => {
                return Err(PathEscapeError::InvalidPath {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
    }
}

//! Session-relative paths inside the execution environment.
//!
//! Paths on this side cannot be canonicalized through the command boundary,
//! so the check is purely syntactic: absolute paths and `..` segments are
//! rejected outright.

use super::PathEscapeError;

/// Checks that `path` is a relative posix path without `..` segments.
///
/// # Errors
///
/// Returns an error for absolute paths, `..` segments and NUL bytes.
pub fn validate(path: &str) -> Result<(), PathEscapeError> {
    if path.contains('\0') {
        return Err(PathEscapeError::NulByte);
    }
    if path.starts_with('/') {
        return Err(PathEscapeError::Absolute(path.to_string()));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(PathEscapeError::ParentSegment(path.to_string()));
    }
    Ok(())
}

/// Joins a validated relative path onto `root`.
///
/// Empty and `.` segments are dropped, so `""` and `"."` resolve to `root`.
///
/// # Errors
///
/// See [`validate`].
pub fn resolve(root: &str, path: &str) -> Result<String, PathEscapeError> {
    validate(path)?;

    let mut resolved = root.trim_end_matches('/').to_string();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        resolved.push('/');
        resolved.push_str(segment);
    }
    Ok(resolved)
}

/// Last segment of a posix path, ignoring trailing slashes.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// File name used when a transfer has no explicit destination.
///
/// # Errors
///
/// Returns an error when `path` has no usable last segment (`""`, `"."`,
/// `"dir/."`), which would otherwise target the whole destination root.
pub fn default_name(path: &str) -> Result<&str, PathEscapeError> {
    match basename(path) {
        "" | "." | ".." => Err(PathEscapeError::NoFileName(path.to_string())),
        name => Ok(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/workspace/sessions/abc";

    #[test]
    fn test_resolve_nested() {
        assert_eq!(
            resolve(ROOT, "a/b/c").unwrap(),
            "/workspace/sessions/abc/a/b/c"
        );
    }

    #[test]
    fn test_resolve_root_itself() {
        assert_eq!(resolve(ROOT, "").unwrap(), ROOT);
        assert_eq!(resolve(ROOT, ".").unwrap(), ROOT);
        assert_eq!(resolve(ROOT, "./").unwrap(), ROOT);
    }

    #[test]
    fn test_resolve_drops_redundant_segments() {
        assert_eq!(
            resolve(ROOT, "./code//foo.py").unwrap(),
            "/workspace/sessions/abc/code/foo.py"
        );
    }

    #[test]
    fn test_rejects_parent_segments() {
        assert!(matches!(
            resolve(ROOT, "../x"),
            Err(PathEscapeError::ParentSegment(_))
        ));
        assert!(resolve(ROOT, "a/../../x").is_err());
        assert!(resolve(ROOT, "a/..").is_err());
    }

    #[test]
    fn test_rejects_absolute() {
        assert!(matches!(
            resolve(ROOT, "/abs/path"),
            Err(PathEscapeError::Absolute(_))
        ));
    }

    #[test]
    fn test_dotted_names_are_not_parent_segments() {
        assert!(resolve(ROOT, "..hidden/file").is_ok());
        assert!(resolve(ROOT, "a/b..c").is_ok());
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("dir/file.txt"), "file.txt");
        assert_eq!(basename("file.txt"), "file.txt");
        assert_eq!(basename("dir/sub/"), "sub");
        assert_eq!(basename(""), "");
    }

    #[test]
    fn test_default_name_needs_a_file_name() {
        assert_eq!(default_name("data/input.csv").ok(), Some("input.csv"));
        for path in ["", ".", "./", "data/.", "data/.."] {
            assert!(
                matches!(default_name(path), Err(PathEscapeError::NoFileName(_))),
                "{path}"
            );
        }
    }
}

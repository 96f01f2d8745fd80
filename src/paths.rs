// src/paths.rs

//! Path sanitization for untrusted archive entries
//!
//! Stored member paths in foreign packages are attacker-controlled. Every
//! path that ends up on disk goes through this module first.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize a stored archive path into a safe relative path
///
/// Rejects `..` components, skips `.` components, and strips leading
/// slashes so absolute stored paths become workspace-relative.
///
/// # Examples
///
/// ```
/// use debark::paths::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("usr/bin/foo").unwrap(), PathBuf::from("usr/bin/foo"));
/// assert_eq!(sanitize_path("/usr/bin/foo").unwrap(), PathBuf::from("usr/bin/foo"));
/// assert!(sanitize_path("../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    // Strip leading slashes to make relative
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => {
                normalized.push(c);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path_str.to_string()));
            }
            Component::Prefix(_) | Component::RootDir => {
                // Already handled by the leading-slash strip
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(
            "empty path after sanitization".to_string(),
        ));
    }

    Ok(normalized)
}

/// Join an untrusted path onto a trusted root
///
/// Sanitizes first, then verifies the canonicalized result is still under
/// the root to catch anything the lexical pass missed.
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let sanitized = sanitize_path(path.as_ref())?;
    let joined = root.join(&sanitized);

    if let (Ok(canonical_root), Ok(canonical_joined)) = (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }
    // If canonicalize fails (path does not exist yet) the lexical check
    // above already constrained the result.

    Ok(joined)
}

/// Check that a symlink target cannot leave the extraction root
///
/// `link_dir` is the directory (relative to the root) the link lives in.
/// Absolute targets are never safe; relative targets are walked lexically.
pub fn symlink_target_is_contained(link_dir: &Path, target: &Path) -> bool {
    if target.is_absolute() {
        return false;
    }

    let mut depth: i64 = link_dir.components().count() as i64;
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::CurDir => {}
            Component::Prefix(_) | Component::RootDir => return false,
        }
    }
    true
}

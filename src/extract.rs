// src/extract.rs

//! Secure extraction of archive payloads into a workspace
//!
//! Every entry is checked before anything is written. Violations are
//! recorded and skipped rather than aborting the run: a mostly-safe
//! archive still converts, and the caller surfaces the skip-report as a
//! warning. Maintainer scripts embedded in the archive are data like
//! everything else; nothing extracted here is ever executed.

use crate::archive::tar::entry_kind;
use crate::archive::{EntryKind, TarArchive};
use crate::error::Result;
use crate::paths::{sanitize_path, symlink_target_is_contained};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum size for a single extracted file (512 MB)
pub const MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Why an entry was left out of the extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Stored path escaped the workspace root
    Traversal,
    /// Symlink whose target resolves outside the workspace root
    UnsafeSymlink,
    /// Device node, FIFO, socket, or hardlink
    SpecialEntry,
    /// Regular file above [`MAX_FILE_SIZE`]
    Oversized,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traversal => write!(f, "path traversal"),
            Self::UnsafeSymlink => write!(f, "unsafe symlink target"),
            Self::SpecialEntry => write!(f, "special entry type"),
            Self::Oversized => write!(f, "oversized file"),
        }
    }
}

/// One entry excluded from extraction
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: SkipReason,
}

/// Outcome of a completed extraction
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Entries materialized on disk (files, directories, safe symlinks)
    pub extracted: usize,
    /// Entries recorded and left out
    pub skipped: Vec<SkippedEntry>,
}

/// Extract a tar stream into `dest`, which must be inside a workspace
///
/// Directory structure is preserved relative to `dest`. File modes keep at
/// most the source's 0o777 bits, so no executable bit appears unless the
/// source entry carried one.
pub fn extract_tar(archive: &TarArchive, dest: &Path) -> Result<ExtractReport> {
    fs::create_dir_all(dest)?;
    let dest_canon = dest.canonicalize()?;

    archive.with_reader(|reader| {
        let mut tar = tar::Archive::new(reader);
        let mut report = ExtractReport::default();

        for entry in tar.entries()? {
            let mut entry = entry?;
            let stored = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let kind = entry_kind(entry.header().entry_type());

            let relative = match sanitize_path(&stored) {
                Ok(relative) => relative,
                Err(_) => {
                    // Tar streams routinely carry a bare "./" root entry;
                    // that is not an attack, just nothing to write.
                    if matches!(kind, EntryKind::Directory)
                        && stored.trim_end_matches('/') == "."
                    {
                        continue;
                    }
                    warn!("skipping entry with unsafe path: {}", stored);
                    report.skipped.push(SkippedEntry {
                        path: stored,
                        reason: SkipReason::Traversal,
                    });
                    continue;
                }
            };
            let target = dest.join(&relative);

            // Earlier entries may have materialized symlinks that redirect
            // part of this path; the kernel resolves those physically, so
            // the existing portion must be re-checked before any write.
            let parent_rel = relative.parent().unwrap_or_else(|| Path::new(""));
            let checked_rel = match kind {
                EntryKind::Directory => relative.as_path(),
                _ => parent_rel,
            };
            if !resolves_inside(dest, &dest_canon, checked_rel) {
                warn!("skipping entry resolving outside the workspace: {}", stored);
                report.skipped.push(SkippedEntry {
                    path: stored,
                    reason: SkipReason::Traversal,
                });
                continue;
            }

            match kind {
                EntryKind::Directory => {
                    fs::create_dir_all(&target)?;
                    report.extracted += 1;
                }
                EntryKind::RegularFile => {
                    if entry.size() > MAX_FILE_SIZE {
                        warn!("skipping oversized file: {} ({} bytes)", stored, entry.size());
                        report.skipped.push(SkippedEntry {
                            path: stored,
                            reason: SkipReason::Oversized,
                        });
                        continue;
                    }
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    // Never write through a symlink left by an earlier entry
                    if let Ok(meta) = target.symlink_metadata()
                        && meta.file_type().is_symlink()
                    {
                        fs::remove_file(&target)?;
                    }
                    let mut output = fs::File::create(&target)?;
                    io::copy(&mut entry, &mut output)?;
                    set_mode(&target, entry.header().mode().unwrap_or(0o644))?;
                    report.extracted += 1;
                }
                EntryKind::Symlink => {
                    let link_target = entry
                        .link_name()
                        .ok()
                        .flatten()
                        .map(|t| PathBuf::from(t.as_ref()));
                    let Some(link_target) = link_target else {
                        report.skipped.push(SkippedEntry {
                            path: stored,
                            reason: SkipReason::SpecialEntry,
                        });
                        continue;
                    };

                    if !symlink_target_is_contained(parent_rel, &link_target) {
                        warn!(
                            "skipping symlink {} -> {} (target escapes workspace)",
                            stored,
                            link_target.display()
                        );
                        report.skipped.push(SkippedEntry {
                            path: stored,
                            reason: SkipReason::UnsafeSymlink,
                        });
                        continue;
                    }

                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let _ = fs::remove_file(&target);
                    #[cfg(unix)]
                    std::os::unix::fs::symlink(&link_target, &target)?;
                    report.extracted += 1;
                }
                EntryKind::Other => {
                    debug!("skipping special entry: {}", stored);
                    report.skipped.push(SkippedEntry {
                        path: stored,
                        reason: SkipReason::SpecialEntry,
                    });
                }
            }
        }

        Ok(report)
    })
}

/// Verify the existing portion of `dest/relative` still resolves under `dest`
///
/// Walks down from `dest`, stopping at the first missing component (anything
/// past it will be created as real directories), and canonicalizes the
/// deepest existing ancestor. Catches escape chains that are lexically clean
/// but pass through symlinks materialized by earlier entries.
fn resolves_inside(dest: &Path, dest_canon: &Path, relative: &Path) -> bool {
    let mut deepest = dest.to_path_buf();
    for component in relative.components() {
        let next = deepest.join(component);
        if next.symlink_metadata().is_err() {
            break;
        }
        deepest = next;
    }
    deepest
        .canonicalize()
        .map(|resolved| resolved.starts_with(dest_canon))
        .unwrap_or(false)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let bits = mode & 0o777;
    let bits = if bits == 0 { 0o644 } else { bits };
    fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

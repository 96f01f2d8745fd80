// src/archive/mod.rs

//! Archive inspection and format detection
//!
//! Identifies input containers by content signature and exposes a
//! restartable, read-only view of their entries. Nothing in this module
//! writes to disk; callers commit to extraction separately.

pub mod deb;
pub mod tar;

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use deb::DebArchive;
pub use tar::TarArchive;

/// Maximum size for an in-memory archive member (64 MB)
///
/// Only small metadata members (control archives, single control files)
/// are ever buffered; payload data is always streamed.
pub const MAX_MEMBER_SIZE: u64 = 64 * 1024 * 1024;

/// Supported container format families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Debian `.deb`: an `ar` archive with nested control/data tars
    DebianPackage,
    /// Gzip-compressed tarball (`.tar.gz` / `.tgz` application bundles)
    GzippedTar,
    /// Uncompressed tarball
    PlainTar,
}

impl ArchiveFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DebianPackage => "deb",
            Self::GzippedTar => "tar.gz",
            Self::PlainTar => "tar",
        }
    }
}

/// Caller-selected input interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatHint {
    /// Detect by content signature
    #[default]
    Auto,
    /// Require a Debian package
    Deb,
    /// Require a tarball bundle
    Tarball,
}

/// Entry type within a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    RegularFile,
    Directory,
    Symlink,
    /// Devices, FIFOs, sockets, hardlinks: never materialized on disk
    Other,
}

/// A single archive member as stored, prior to any sanitization
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// Detect the container format of a file by magic bytes
///
/// Extensions never decide alone: a renamed valid container is still
/// identified, and unrecognizable content fails regardless of its name.
pub fn detect_format(path: impl AsRef<Path>) -> Result<ArchiveFormat> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    // Longest signature we care about is "ustar" at offset 257
    let mut header = [0u8; 265];
    let n = read_up_to(&mut file, &mut header)?;

    if n >= 7 && header[0..7] == *b"!<arch>" {
        return Ok(ArchiveFormat::DebianPackage);
    }
    if n >= 2 && header[0..2] == [0x1F, 0x8B] {
        return Ok(ArchiveFormat::GzippedTar);
    }
    if n >= 262 && &header[257..262] == b"ustar" {
        return Ok(ArchiveFormat::PlainTar);
    }

    Err(Error::UnsupportedFormat(format!(
        "no recognizable container signature in {}",
        path.display()
    )))
}

/// Detect the format and check it against an explicit caller hint
pub fn detect_format_with_hint(path: impl AsRef<Path>, hint: FormatHint) -> Result<ArchiveFormat> {
    let path = path.as_ref();
    let detected = detect_format(path)?;

    match (hint, detected) {
        (FormatHint::Auto, format) => Ok(format),
        (FormatHint::Deb, ArchiveFormat::DebianPackage) => Ok(detected),
        (FormatHint::Tarball, ArchiveFormat::GzippedTar | ArchiveFormat::PlainTar) => Ok(detected),
        (hint, format) => Err(Error::UnsupportedFormat(format!(
            "{} detected as {} but caller required {:?}",
            path.display(),
            format.name(),
            hint
        ))),
    }
}

/// An opened, inspectable container
pub enum ArchiveHandle {
    Deb(DebArchive),
    Tar(TarArchive),
}

impl ArchiveHandle {
    /// Open and validate a container at `path`
    ///
    /// Validation enumerates the outermost entry list once, so a file that
    /// merely carries a plausible signature but is otherwise corrupt is
    /// rejected here rather than mid-conversion.
    pub fn open(path: impl AsRef<Path>, hint: FormatHint) -> Result<Self> {
        let path = path.as_ref();
        let format = detect_format_with_hint(path, hint)?;

        let handle = match format {
            ArchiveFormat::DebianPackage => Self::Deb(DebArchive::open(path)?),
            ArchiveFormat::GzippedTar | ArchiveFormat::PlainTar => {
                Self::Tar(TarArchive::open(path)?)
            }
        };

        handle.entries().map_err(|e| {
            Error::UnsupportedFormat(format!(
                "{} has a {} signature but cannot be read as one: {}",
                path.display(),
                format.name(),
                e
            ))
        })?;

        Ok(handle)
    }

    pub fn format(&self) -> ArchiveFormat {
        match self {
            Self::Deb(_) => ArchiveFormat::DebianPackage,
            // The tar handle re-detects compression on each read; report
            // the family generically as a gzipped tar for display purposes.
            Self::Tar(tar) => tar.format(),
        }
    }

    /// List entries of the outermost container
    ///
    /// Restartable: each call re-reads from the start of the file.
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        match self {
            Self::Deb(deb) => deb.members(),
            Self::Tar(tar) => tar.entries(),
        }
    }
}

/// Normalize an archive member path for name comparison
///
/// Strips leading slashes and a `./` prefix without touching significant
/// dots elsewhere in the name.
pub fn normalize_member_name(name: &str) -> &str {
    let cleaned = name.trim_start_matches('/');
    cleaned.strip_prefix("./").unwrap_or(cleaned)
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detect_deb_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renamed.tgz");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"!<arch>\ndebian-binary   ").unwrap();
        assert_eq!(detect_format(&path).unwrap(), ArchiveFormat::DebianPackage);
    }

    #[test]
    fn detect_gzip_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.deb");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0x1F, 0x8B, 0x08, 0x00]).unwrap();
        assert_eq!(detect_format(&path).unwrap(), ArchiveFormat::GzippedTar);
    }

    #[test]
    fn detect_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.deb");
        std::fs::write(&path, b"this is not a package at all").unwrap();
        assert!(matches!(
            detect_format(&path),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn hint_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.deb");
        std::fs::write(&path, b"!<arch>\n").unwrap();
        assert!(detect_format_with_hint(&path, FormatHint::Deb).is_ok());
        assert!(detect_format_with_hint(&path, FormatHint::Tarball).is_err());
    }

    #[test]
    fn normalize_member_names() {
        assert_eq!(normalize_member_name("./control"), "control");
        assert_eq!(normalize_member_name("/usr/bin/app"), "usr/bin/app");
        assert_eq!(normalize_member_name("control.tar.gz"), "control.tar.gz");
        assert_eq!(normalize_member_name("./.PKGINFO"), ".PKGINFO");
    }
}

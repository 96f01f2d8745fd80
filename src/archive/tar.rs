// src/archive/tar.rs

//! Tar stream access with transparent decompression
//!
//! Backs both standalone tarball inputs and the nested `control.tar.*` /
//! `data.tar.*` members of a Debian container. Readers are rebuilt from the
//! source on every use, so entry listing is restartable and nothing is
//! buffered beyond small metadata members.

use crate::archive::{
    ArchiveEntry, ArchiveFormat, EntryKind, MAX_MEMBER_SIZE, normalize_member_name,
};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use xz2::read::XzDecoder;

/// Compression wrapping a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
    Xz,
    Zstd,
}

enum TarSource {
    /// A tarball file on disk; compression detected by magic bytes
    File(PathBuf),
    /// A named member inside a `.deb` ar container; compression from suffix
    DebMember { deb: PathBuf, member: String },
}

/// A restartable handle onto a (possibly compressed) tar stream
pub struct TarArchive {
    source: TarSource,
}

impl TarArchive {
    /// Open a tarball file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            source: TarSource::File(path.as_ref().to_path_buf()),
        })
    }

    /// Handle onto a tar member nested inside a Debian ar container
    pub(crate) fn deb_member(deb: PathBuf, member: String) -> Self {
        Self {
            source: TarSource::DebMember { deb, member },
        }
    }

    /// Container family for display purposes
    pub fn format(&self) -> ArchiveFormat {
        match &self.source {
            TarSource::File(path) => match file_compression(path) {
                Ok(TarCompression::None) => ArchiveFormat::PlainTar,
                _ => ArchiveFormat::GzippedTar,
            },
            TarSource::DebMember { .. } => ArchiveFormat::PlainTar,
        }
    }

    /// Run `f` against a freshly opened, decompressed tar stream
    ///
    /// Every call rebuilds the reader chain from the underlying source, so
    /// callers may iterate the archive as many times as they need.
    pub fn with_reader<T>(&self, f: impl FnOnce(&mut dyn Read) -> Result<T>) -> Result<T> {
        match &self.source {
            TarSource::File(path) => {
                let compression = file_compression(path)?;
                let file = File::open(path)?;
                let mut reader = decompress(file, compression)?;
                f(&mut *reader)
            }
            TarSource::DebMember { deb, member } => {
                let file = File::open(deb)?;
                let mut container = ar::Archive::new(file);
                while let Some(entry) = container.next_entry() {
                    let entry = entry?;
                    let name = String::from_utf8_lossy(entry.header().identifier()).into_owned();
                    if name == *member {
                        let compression = member_compression(&name);
                        let mut reader = decompress(entry, compression)?;
                        return f(&mut *reader);
                    }
                }
                Err(Error::MalformedMetadata(format!(
                    "member {} not found in {}",
                    member,
                    deb.display()
                )))
            }
        }
    }

    /// List all entries with their stored paths, kinds, and sizes
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.with_reader(|reader| {
            let mut archive = tar::Archive::new(reader);
            let mut out = Vec::new();
            for entry in archive.entries()? {
                let entry = entry?;
                let path = entry.path_bytes();
                out.push(ArchiveEntry {
                    path: String::from_utf8_lossy(&path).into_owned(),
                    kind: entry_kind(entry.header().entry_type()),
                    size: entry.size(),
                });
            }
            Ok(out)
        })
    }

    /// Read one regular file out of the archive by normalized name
    ///
    /// Used for small metadata members only; enforces [`MAX_MEMBER_SIZE`].
    pub fn read_file(&self, wanted: &str) -> Result<Option<Vec<u8>>> {
        self.with_reader(|reader| {
            let mut archive = tar::Archive::new(reader);
            for entry in archive.entries()? {
                let mut entry = entry?;
                if entry.header().entry_type() != tar::EntryType::Regular {
                    continue;
                }
                let path = entry.path_bytes();
                let name = String::from_utf8_lossy(&path).into_owned();
                if normalize_member_name(&name) != wanted {
                    continue;
                }
                if entry.size() > MAX_MEMBER_SIZE {
                    return Err(Error::MalformedMetadata(format!(
                        "metadata member {} is implausibly large ({} bytes)",
                        name,
                        entry.size()
                    )));
                }
                let mut content = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut content)?;
                return Ok(Some(content));
            }
            Ok(None)
        })
    }
}

/// Compression for a Debian member, by the suffix dpkg itself uses
pub fn member_compression(name: &str) -> TarCompression {
    if name.ends_with(".gz") {
        TarCompression::Gzip
    } else if name.ends_with(".xz") {
        TarCompression::Xz
    } else if name.ends_with(".zst") {
        TarCompression::Zstd
    } else {
        TarCompression::None
    }
}

/// Detect compression of a file on disk by magic bytes
fn file_compression(path: &Path) -> Result<TarCompression> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 6];
    let mut n = 0;
    while n < magic.len() {
        let read = file.read(&mut magic[n..])?;
        if read == 0 {
            break;
        }
        n += read;
    }

    if n >= 2 && magic[0..2] == [0x1F, 0x8B] {
        Ok(TarCompression::Gzip)
    } else if n >= 6 && magic[0..6] == [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00] {
        Ok(TarCompression::Xz)
    } else if n >= 4 && magic[0..4] == [0x28, 0xB5, 0x2F, 0xFD] {
        Ok(TarCompression::Zstd)
    } else {
        Ok(TarCompression::None)
    }
}

fn decompress<'a, R: Read + 'a>(
    reader: R,
    compression: TarCompression,
) -> Result<Box<dyn Read + 'a>> {
    Ok(match compression {
        TarCompression::None => Box::new(reader),
        TarCompression::Gzip => Box::new(GzDecoder::new(reader)),
        TarCompression::Xz => Box::new(XzDecoder::new(reader)),
        TarCompression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
    })
}

pub(crate) fn entry_kind(entry_type: tar::EntryType) -> EntryKind {
    match entry_type {
        tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
            EntryKind::RegularFile
        }
        tar::EntryType::Directory => EntryKind::Directory,
        tar::EntryType::Symlink => EntryKind::Symlink,
        _ => EntryKind::Other,
    }
}

// src/archive/deb.rs

//! Debian package container access
//!
//! A `.deb` is an `ar` archive carrying `debian-binary`, a `control.tar.*`
//! member with package metadata, and a `data.tar.*` member with the payload.
//! Both tar members are exposed as sub-archive handles inspectable through
//! the same [`TarArchive`] interface; nesting stops there, so traversal
//! depth is bounded at two regardless of input.

use crate::archive::{ArchiveEntry, EntryKind, TarArchive};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An opened Debian package container
pub struct DebArchive {
    path: PathBuf,
}

impl DebArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List the outer ar members
    ///
    /// Restartable: re-reads the container on every call.
    pub fn members(&self) -> Result<Vec<ArchiveEntry>> {
        let file = File::open(&self.path)?;
        let mut container = ar::Archive::new(file);
        let mut out = Vec::new();
        while let Some(entry) = container.next_entry() {
            let entry = entry?;
            out.push(ArchiveEntry {
                path: String::from_utf8_lossy(entry.header().identifier()).into_owned(),
                kind: EntryKind::RegularFile,
                size: entry.header().size(),
            });
        }
        Ok(out)
    }

    /// Sub-archive handle for the `control.tar.*` member
    pub fn control_archive(&self) -> Result<TarArchive> {
        self.member_archive("control.tar")
    }

    /// Sub-archive handle for the `data.tar.*` member
    pub fn data_archive(&self) -> Result<TarArchive> {
        self.member_archive("data.tar")
    }

    /// Read the `control` metadata file out of the control member
    pub fn control_file(&self) -> Result<String> {
        let control = self.control_archive()?;
        let content = control.read_file("control")?.ok_or_else(|| {
            Error::MalformedMetadata(format!(
                "no control file inside control.tar of {}",
                self.path.display()
            ))
        })?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    fn member_archive(&self, prefix: &str) -> Result<TarArchive> {
        let member = self
            .members()?
            .into_iter()
            .map(|entry| entry.path)
            .find(|name| name.starts_with(prefix))
            .ok_or_else(|| {
                Error::MalformedMetadata(format!(
                    "{} is missing a {}.* member",
                    self.path.display(),
                    prefix
                ))
            })?;
        debug!("opening deb member {}", member);
        Ok(TarArchive::deb_member(self.path.clone(), member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    // Name bytes written verbatim so the `./` prefix dpkg stores survives;
    // the builder's path helpers would normalize it away.
    fn tar_gz_with_file(name: &str, content: &[u8]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        {
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..name.len()].copy_from_slice(name.as_bytes());
        }
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn build_deb(dir: &Path, control: &str) -> PathBuf {
        let path = dir.join("sample.deb");
        let file = File::create(&path).unwrap();
        let mut builder = ar::Builder::new(file);

        let version = b"2.0\n";
        let header = ar::Header::new(b"debian-binary".to_vec(), version.len() as u64);
        builder.append(&header, &version[..]).unwrap();

        let control_tar = tar_gz_with_file("./control", control.as_bytes());
        let header = ar::Header::new(b"control.tar.gz".to_vec(), control_tar.len() as u64);
        builder.append(&header, control_tar.as_slice()).unwrap();

        let data_tar = tar_gz_with_file("./usr/bin/sample", b"#!/bin/sh\n");
        let header = ar::Header::new(b"data.tar.gz".to_vec(), data_tar.len() as u64);
        builder.append(&header, data_tar.as_slice()).unwrap();

        path
    }

    #[test]
    fn lists_members_and_reads_control() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_deb(dir.path(), "Package: sample\nVersion: 1.0\n");
        let deb = DebArchive::open(&path).unwrap();

        let members: Vec<String> = deb.members().unwrap().into_iter().map(|m| m.path).collect();
        assert_eq!(members, vec!["debian-binary", "control.tar.gz", "data.tar.gz"]);

        let control = deb.control_file().unwrap();
        assert!(control.contains("Package: sample"));

        let data_entries = deb.data_archive().unwrap().entries().unwrap();
        assert_eq!(data_entries[0].path, "./usr/bin/sample");
    }

    #[test]
    fn missing_member_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.deb");
        let file = File::create(&path).unwrap();
        let mut builder = ar::Builder::new(file);
        let body = b"2.0\n";
        let header = ar::Header::new(b"debian-binary".to_vec(), body.len() as u64);
        builder.append(&header, &body[..]).unwrap();
        drop(builder);

        let deb = DebArchive::open(&path).unwrap();
        assert!(matches!(
            deb.control_archive(),
            Err(Error::MalformedMetadata(_))
        ));
    }
}

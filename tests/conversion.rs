// tests/conversion.rs
//! Integration tests for the conversion engine
//!
//! These tests exercise the public pipeline over crafted fixture archives:
//! - Content-signature format detection, independent of file extension
//! - Control metadata parsing and the dependency mapping report
//! - Secure extraction of hostile archive entries
//! - Strategy selection and workspace teardown on every run outcome

use debark::archive::{ArchiveFormat, ArchiveHandle, FormatHint};
use debark::convert::{ConvertOptions, Converter};
use debark::extract::{SkipReason, extract_tar};
use debark::{Error, MappingStatus};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

// =============================================================================
// FIXTURE HELPERS
// =============================================================================

/// Serialize files into a gzipped tar, returning the raw bytes
///
/// Entry names are written into the header verbatim, so hostile stored
/// paths (`..` components, absolute paths) survive the way a malicious
/// producer would emit them.
fn tar_gz_bytes(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content, mode) in files {
        let mut header = tar::Header::new_gnu();
        {
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..name.len()].copy_from_slice(name.as_bytes());
        }
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a .deb at `path` with the given control block and data files
fn write_deb(path: &Path, control: &str, data_files: &[(&str, &[u8], u32)]) {
    let file = File::create(path).unwrap();
    let mut builder = ar::Builder::new(file);

    let version = b"2.0\n";
    let header = ar::Header::new(b"debian-binary".to_vec(), version.len() as u64);
    builder.append(&header, &version[..]).unwrap();

    let control_tar = tar_gz_bytes(&[("./control", control.as_bytes(), 0o644)]);
    let header = ar::Header::new(b"control.tar.gz".to_vec(), control_tar.len() as u64);
    builder.append(&header, control_tar.as_slice()).unwrap();

    let data_tar = tar_gz_bytes(data_files);
    let header = ar::Header::new(b"data.tar.gz".to_vec(), data_tar.len() as u64);
    builder.append(&header, data_tar.as_slice()).unwrap();
}

fn write_tarball(path: &Path, files: &[(&str, &[u8], u32)]) {
    std::fs::write(path, tar_gz_bytes(files)).unwrap();
}

fn sample_control() -> &'static str {
    "Package: hello-web\n\
     Version: 2.4-1\n\
     Architecture: amd64\n\
     Maintainer: Example <dev@example.org>\n\
     Depends: libc6 (>= 2.34), libbar\n\
     Description: A sample application\n"
}

// =============================================================================
// FORMAT DETECTION
// =============================================================================

#[test]
fn deb_detected_regardless_of_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("misleading.tar.gz");
    write_deb(&path, sample_control(), &[("./usr/bin/hello", b"bin", 0o755)]);

    let handle = ArchiveHandle::open(&path, FormatHint::Auto).unwrap();
    assert_eq!(handle.format(), ArchiveFormat::DebianPackage);
}

#[test]
fn tarball_detected_regardless_of_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("misleading.deb");
    write_tarball(&path, &[("app/run", b"#!/bin/sh\n", 0o755)]);

    let handle = ArchiveHandle::open(&path, FormatHint::Auto).unwrap();
    assert_eq!(handle.format(), ArchiveFormat::GzippedTar);
}

#[test]
fn corrupt_input_is_unsupported_for_any_extension() {
    let dir = TempDir::new().unwrap();
    for name in ["junk.deb", "junk.tar.gz", "junk.tgz"] {
        let path = dir.path().join(name);
        std::fs::write(&path, b"definitely not a package").unwrap();
        assert!(matches!(
            ArchiveHandle::open(&path, FormatHint::Auto),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}

#[test]
fn truncated_gzip_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncated.tar.gz");
    // Valid gzip magic, garbage after
    std::fs::write(&path, [0x1F, 0x8B, 0x08, 0x00, 0xAA, 0xBB]).unwrap();
    assert!(matches!(
        ArchiveHandle::open(&path, FormatHint::Auto),
        Err(Error::UnsupportedFormat(_))
    ));
}

// =============================================================================
// METADATA AND MAPPING REPORT
// =============================================================================

#[test]
fn inspect_reports_descriptor_and_ordered_mappings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello-web.deb");
    write_deb(&path, sample_control(), &[("./usr/bin/hello", b"bin", 0o755)]);

    let report = Converter::new()
        .inspect(&path, FormatHint::Auto)
        .unwrap();

    assert_eq!(report.descriptor.name, "hello-web");
    assert_eq!(report.descriptor.version, "2.4.1");
    assert_eq!(report.descriptor.architecture, "x86_64");

    // One mapping per dependency, input order preserved
    assert_eq!(report.mappings.len(), 2);
    assert_eq!(report.mappings[0].source.raw_name, "libc6");
    assert_eq!(
        report.mappings[0].source.version_constraint.as_deref(),
        Some(">=2.34")
    );
    assert_eq!(report.mappings[0].status, MappingStatus::Resolved);
    assert_eq!(report.mappings[0].resolved_name.as_deref(), Some("glibc"));

    assert_eq!(report.mappings[1].source.raw_name, "libbar");
    assert_eq!(report.mappings[1].status, MappingStatus::Unresolved);
    assert_eq!(report.mappings[1].resolved_name, None);
}

#[test]
fn inspect_synthesizes_tarball_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coolapp-3.1.4-linux-x86_64.tar.gz");
    write_tarball(&path, &[("coolapp-3.1.4/coolapp", b"#!/bin/sh\n", 0o755)]);

    let report = Converter::new().inspect(&path, FormatHint::Auto).unwrap();
    assert_eq!(report.descriptor.name, "coolapp");
    // The `_` in the arch marker is a token split point like `-`
    assert_eq!(report.descriptor.version, "3.1.4.linux.x86.64");
    assert_eq!(report.descriptor.architecture, "x86_64");
    assert!(report.mappings.is_empty());
}

#[test]
fn missing_package_field_is_malformed_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.deb");
    write_deb(&path, "Version: 1.0\n", &[("./usr/share/x", b"x", 0o644)]);

    assert!(matches!(
        Converter::new().inspect(&path, FormatHint::Auto),
        Err(Error::MalformedMetadata(_))
    ));
}

// =============================================================================
// SECURE EXTRACTION
// =============================================================================

#[test]
fn hostile_data_member_extracts_safely() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hostile.deb");
    write_deb(
        &path,
        sample_control(),
        &[
            ("../../etc/passwd", b"root::0:0::/:/bin/sh\n", 0o644),
            ("/etc/shadow-clone", b"stolen", 0o600),
            ("./usr/bin/hello", b"#!/bin/sh\n", 0o755),
        ],
    );

    let ArchiveHandle::Deb(deb) = ArchiveHandle::open(&path, FormatHint::Auto).unwrap() else {
        panic!("expected deb handle");
    };
    let data = deb.data_archive().unwrap();

    let dest = dir.path().join("ws");
    let report = extract_tar(&data, &dest).unwrap();

    // The traversal entry is skipped, not fatal; the legitimate file lands
    let traversals: Vec<_> = report
        .skipped
        .iter()
        .filter(|s| s.reason == SkipReason::Traversal)
        .collect();
    assert_eq!(traversals.len(), 1);
    assert!(traversals[0].path.contains("etc/passwd"));
    assert!(dest.join("usr/bin/hello").is_file());

    // The absolute stored path was re-rooted inside the destination
    assert!(dest.join("etc/shadow-clone").is_file());
    assert!(!Path::new("/etc/shadow-clone").exists());
}

// =============================================================================
// STRATEGY AND WORKSPACE LIFECYCLE
// =============================================================================

/// Options pinned to a private temp root and a tool that cannot exist
fn isolated_options(temp_root: &Path) -> ConvertOptions {
    ConvertOptions {
        temp_root: Some(temp_root.to_path_buf()),
        external_tool: "debark-test-missing-tool".to_string(),
        ..ConvertOptions::default()
    }
}

fn assert_no_workspace_left(temp_root: &Path) {
    let leftovers: Vec<PathBuf> = std::fs::read_dir(temp_root)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    assert!(leftovers.is_empty(), "workspace leaked: {:?}", leftovers);
}

#[test]
fn absent_tool_falls_back_and_workspace_is_torn_down() {
    let dir = TempDir::new().unwrap();
    let temp_root = TempDir::new().unwrap();
    let path = dir.path().join("hello-web.deb");
    write_deb(&path, sample_control(), &[("./usr/bin/hello", b"bin", 0o755)]);

    // With the external tool absent the selector starts in fallback; the
    // run then either succeeds through makepkg or fails terminally if the
    // build toolchain is not installed. Teardown must happen either way.
    match Converter::new().convert(&path, &isolated_options(temp_root.path()), &mut |_| {}) {
        Ok(result) => {
            assert_eq!(result.strategy, debark::Strategy::Fallback);
            assert!(result.artifact.exists());
            result.release();
        }
        Err(e) => assert!(matches!(e, Error::ConversionFailed(_))),
    }
    assert_no_workspace_left(temp_root.path());
}

#[test]
fn conversion_outcome_is_deterministic_for_fixed_environment() {
    let dir = TempDir::new().unwrap();
    let temp_root = TempDir::new().unwrap();
    let path = dir.path().join("hello-web.deb");
    write_deb(&path, sample_control(), &[("./usr/bin/hello", b"bin", 0o755)]);

    let first = Converter::new()
        .convert(&path, &isolated_options(temp_root.path()), &mut |_| {})
        .map(|r| {
            let strategy = r.strategy;
            r.release();
            strategy
        });
    let second = Converter::new()
        .convert(&path, &isolated_options(temp_root.path()), &mut |_| {})
        .map(|r| {
            let strategy = r.strategy;
            r.release();
            strategy
        });

    match (first, second) {
        (Ok(a), Ok(b)) => assert_eq!(a, b),
        (Err(a), Err(b)) => {
            assert!(matches!(a, Error::ConversionFailed(_)));
            assert!(matches!(b, Error::ConversionFailed(_)));
        }
        other => panic!("outcomes diverged across identical runs: {:?}", other),
    }
    assert_no_workspace_left(temp_root.path());
}

#[test]
fn cancellation_tears_down_the_workspace() {
    let dir = TempDir::new().unwrap();
    let temp_root = TempDir::new().unwrap();
    let path = dir.path().join("hello-web.deb");
    write_deb(&path, sample_control(), &[("./usr/bin/hello", b"bin", 0o755)]);

    let cancel = Arc::new(AtomicBool::new(true));
    let options = ConvertOptions {
        cancel: Some(cancel),
        ..isolated_options(temp_root.path())
    };

    assert!(matches!(
        Converter::new().convert(&path, &options, &mut |_| {}),
        Err(Error::Cancelled)
    ));
    assert_no_workspace_left(temp_root.path());
}

#[test]
fn detection_errors_leave_no_workspace_behind() {
    let dir = TempDir::new().unwrap();
    let temp_root = TempDir::new().unwrap();
    let path = dir.path().join("garbage.deb");
    std::fs::write(&path, b"not a package").unwrap();

    assert!(matches!(
        Converter::new().convert(&path, &isolated_options(temp_root.path()), &mut |_| {}),
        Err(Error::UnsupportedFormat(_))
    ));
    assert_no_workspace_left(temp_root.path());
}

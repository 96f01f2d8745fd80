// src/depmap.rs

//! Debian to Arch dependency name translation
//!
//! Best-effort and purely local: an exact translation table first, a
//! passthrough set of names shared by both ecosystems second, and a
//! trailing-digit soname heuristic last. A miss is a reportable condition,
//! not an error; the caller decides whether unresolved entries warrant
//! aborting before installation.

use crate::metadata::DependencySpec;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static TRAILING_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+$").unwrap());

/// Debian package name -> Arch package name, for names that differ
const DEB_TO_ARCH: &[(&str, &str)] = &[
    ("adduser", "shadow"),
    ("ca-certificates", "ca-certificates"),
    ("gcc-12-base", "gcc-libs"),
    ("libasound2", "alsa-lib"),
    ("libatk1.0-0", "atk"),
    ("libatk-bridge2.0-0", "at-spi2-core"),
    ("libbz2-1.0", "bzip2"),
    ("libc6", "glibc"),
    ("libcurl4", "curl"),
    ("libdbus-1-3", "dbus"),
    ("libexpat1", "expat"),
    ("libfontconfig1", "fontconfig"),
    ("libfreetype6", "freetype2"),
    ("libgcc-s1", "gcc-libs"),
    ("libgdk-pixbuf-2.0-0", "gdk-pixbuf2"),
    ("libglib2.0-0", "glib2"),
    ("libgtk-3-0", "gtk3"),
    ("libnss3", "nss"),
    ("libnspr4", "nspr"),
    ("libnotify4", "libnotify"),
    ("libpango-1.0-0", "pango"),
    ("libpulse0", "libpulse"),
    ("libssl3", "openssl"),
    ("libstdc++6", "gcc-libs"),
    ("libuuid1", "util-linux-libs"),
    ("libx11-6", "libx11"),
    ("libxcomposite1", "libxcomposite"),
    ("libxcursor1", "libxcursor"),
    ("libxdamage1", "libxdamage"),
    ("libxext6", "libxext"),
    ("libxfixes3", "libxfixes"),
    ("libxi6", "libxi"),
    ("libxrandr2", "libxrandr"),
    ("libxrender1", "libxrender"),
    ("libxtst6", "libxtst"),
    ("python3", "python"),
    ("python3-gi", "python-gobject"),
    ("xdg-utils", "xdg-utils"),
    ("zlib1g", "zlib"),
];

/// Names identical in both ecosystems
const PASSTHROUGH: &[&str] = &[
    "bash", "coreutils", "curl", "dbus", "file", "findutils", "glib2", "grep", "gzip", "libx11",
    "openssl", "sed", "tar", "util-linux", "which", "xz", "zstd",
];

/// Resolution outcome for a single dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    Resolved,
    Unresolved,
}

/// Per-dependency translation record, shown to the caller before install
#[derive(Debug, Clone)]
pub struct DependencyMapping {
    pub source: DependencySpec,
    pub resolved_name: Option<String>,
    pub status: MappingStatus,
}

/// Translates Debian dependency names to Arch package names
pub struct DependencyMapper {
    table: HashMap<&'static str, &'static str>,
    passthrough: HashSet<&'static str>,
}

impl Default for DependencyMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyMapper {
    pub fn new() -> Self {
        Self {
            table: DEB_TO_ARCH.iter().copied().collect(),
            passthrough: PASSTHROUGH.iter().copied().collect(),
        }
    }

    /// Translate one dependency spec
    pub fn map(&self, spec: &DependencySpec) -> DependencyMapping {
        let key = spec.raw_name.to_lowercase();

        let resolved = self
            .table
            .get(key.as_str())
            .or_else(|| self.passthrough.get(key.as_str()))
            .copied()
            .map(str::to_string)
            .or_else(|| self.soname_heuristic(&key));

        match resolved {
            Some(name) => DependencyMapping {
                source: spec.clone(),
                resolved_name: Some(name),
                status: MappingStatus::Resolved,
            },
            None => DependencyMapping {
                source: spec.clone(),
                resolved_name: None,
                status: MappingStatus::Unresolved,
            },
        }
    }

    /// Translate an ordered sequence, one mapping per spec, order preserved
    pub fn map_all(&self, specs: &[DependencySpec]) -> Vec<DependencyMapping> {
        specs.iter().map(|spec| self.map(spec)).collect()
    }

    /// Strip a trailing soname digit and retry the passthrough set
    ///
    /// Catches names like `libx11-6` where Debian appends the library
    /// major version that Arch leaves off.
    fn soname_heuristic(&self, key: &str) -> Option<String> {
        let guess = TRAILING_DIGITS_RE.replace(key, "");
        let guess = guess.trim_end_matches('-');
        if guess.is_empty() {
            return None;
        }
        self.passthrough.get(guess).map(|name| name.to_string())
    }
}

/// Resolved target names, deduplicated and sorted for the build recipe
pub fn resolved_names(mappings: &[DependencyMapping]) -> Vec<String> {
    let mut names: Vec<String> = mappings
        .iter()
        .filter_map(|m| m.resolved_name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

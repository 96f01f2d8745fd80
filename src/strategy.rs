// src/strategy.rs

//! Conversion strategy selection and external tool delegation
//!
//! The choice between delegating to an external converter and the manual
//! extraction + recipe path is an explicit state machine rather than a
//! try/catch cascade, so the fallback trigger is auditable and testable
//! without touching process invocation.

use crate::archive::TarArchive;
use crate::error::{Error, Result};
use crate::exec::{LogSink, command_exists, run_streamed};
use crate::metadata::SourceFormat;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static EMBEDDED_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d").unwrap());
static SONAME_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.").unwrap());

/// Default external converter for Debian input
pub const DEFAULT_EXTERNAL_TOOL: &str = "debtap";

/// Which conversion path produced the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// External converter tool (deeper ecosystem knowledge, preferred)
    ExternalTool,
    /// Secure extraction + generated build recipe
    Fallback,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalTool => write!(f, "external tool"),
            Self::Fallback => write!(f, "fallback recipe"),
        }
    }
}

/// State of the per-run strategy selector
///
/// `PreferExternal` exists only for Debian input with a usable external
/// tool; any delegation failure moves to `Fallback`, and fallback failure
/// is terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    PreferExternal,
    Fallback,
    Done(Strategy),
}

impl SelectorState {
    /// Initial state for a run, decided once from the fixed environment
    ///
    /// An absent tool short-circuits straight to `Fallback`; no invocation
    /// is ever attempted in that case.
    pub fn initial(format: SourceFormat, delegate: bool, tool_available: bool) -> Self {
        match format {
            SourceFormat::Deb if delegate && tool_available => Self::PreferExternal,
            _ => Self::Fallback,
        }
    }

    /// Transition after a failed external delegation
    pub fn external_failed(self) -> Self {
        match self {
            Self::PreferExternal => Self::Fallback,
            other => other,
        }
    }

    /// Terminal transition after a successful conversion
    pub fn completed(self) -> Self {
        match self {
            Self::PreferExternal => Self::Done(Strategy::ExternalTool),
            Self::Fallback => Self::Done(Strategy::Fallback),
            done => done,
        }
    }
}

/// Black-box driver for the external converter tool
///
/// The contract is input path in, artifact file out; anything else (tool
/// missing, non-zero exit, no artifact produced) counts as failure and is
/// recovered by the selector, never surfaced as a run error.
pub struct ExternalConverter {
    program: String,
}

impl ExternalConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn available(&self) -> bool {
        command_exists(&self.program)
    }

    /// Delegate conversion of `deb_path`, artifacts landing in `output_dir`
    pub fn convert(
        &self,
        deb_path: &Path,
        output_dir: &Path,
        sink: LogSink<'_>,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let output_arg = output_dir.to_string_lossy().into_owned();
        let deb_arg = deb_path.to_string_lossy().into_owned();
        let mut args: Vec<&str> = Vec::new();
        if let Some(flag) = self.quiet_flag() {
            args.push(flag);
        }
        args.extend(["-o", output_arg.as_str(), deb_arg.as_str()]);

        // Pin the editor away and start the artifact clock slightly early
        // so a tool that writes fast on a coarse-mtime filesystem still
        // gets its output picked up.
        let started_at = SystemTime::now() - Duration::from_secs(2);
        let envs = [
            ("EDITOR", "/usr/bin/true"),
            ("VISUAL", "/usr/bin/true"),
            ("NO_COLOR", "1"),
        ];

        info!("delegating conversion to {}", self.program);
        let output = run_streamed(&self.program, &args, Some(output_dir), &envs, sink)?;
        if !output.success() {
            return Err(Error::CommandFailed(format!(
                "{} exited with code {}",
                self.program, output.code
            )));
        }

        newest_artifact(output_dir, started_at).ok_or_else(|| {
            Error::CommandFailed(format!(
                "{} completed but produced no package artifact",
                self.program
            ))
        })
    }

    /// Probe `--help` for a quiet flag so the tool cannot go interactive
    fn quiet_flag(&self) -> Option<&'static str> {
        let help = run_streamed(&self.program, &["--help"], None, &[], &mut |_| {})
            .map(|output| output.joined())
            .unwrap_or_default();
        if help.contains("-Q") {
            Some("-Q")
        } else if help.contains("-q") {
            Some("-q")
        } else {
            debug!("{} advertises no quiet flag", self.program);
            None
        }
    }
}

/// Find the most recent `*.pkg.tar*` artifact created after `since`
pub fn newest_artifact(dir: &Path, since: SystemTime) -> Option<PathBuf> {
    let mut candidates: Vec<(SystemTime, PathBuf)> = WalkDir::new(dir)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .contains(".pkg.tar")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            (modified >= since).then(|| (modified, entry.into_path()))
        })
        .collect();

    if candidates.is_empty() {
        warn!("no package artifact found under {}", dir.display());
        return None;
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    Some(candidates.remove(0).1)
}

/// Vet the dependency metadata of a delegated artifact
///
/// A known failure mode of external converters is soname-style Debian
/// names leaking into the generated package untranslated. The artifact's
/// `.PKGINFO` is re-opened and its `depend =` entries are checked; if
/// enough of them look mangled, or they barely overlap the expected
/// mappings, the artifact is rejected and the caller falls back to the
/// recipe path.
pub fn delegated_artifact_is_usable(
    artifact: &Path,
    expected: &[String],
    sink: LogSink<'_>,
) -> bool {
    let deps = match pkginfo_dependencies(artifact) {
        Ok(deps) => deps,
        Err(e) => {
            warn!("cannot read .PKGINFO from {}: {}", artifact.display(), e);
            return true;
        }
    };
    if deps.is_empty() {
        return true;
    }

    let bases: Vec<String> = deps.iter().map(|dep| dependency_base(dep)).collect();
    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();
    let base_set: HashSet<&str> = bases.iter().map(String::as_str).collect();
    let overlap = expected_set.intersection(&base_set).count();

    let mut suspicious: Vec<&str> = Vec::new();
    for (dep, base) in deps.iter().zip(&bases) {
        let has_relation = dep.contains(['<', '>', '=']);
        if base.is_empty()
            || (base.len() <= 1 && has_relation)
            || EMBEDDED_VERSION_RE.is_match(base)
            || (base.starts_with("lib") && SONAME_SUFFIX_RE.is_match(base))
        {
            suspicious.push(dep);
        }
    }

    if suspicious.len() >= 4 {
        let preview = suspicious[..suspicious.len().min(6)].join(", ");
        warn!(
            "delegated artifact has {} mangled dependency names: {}",
            suspicious.len(),
            preview
        );
        sink(&format!(
            "dependency check failed: {} mangled names ({})",
            suspicious.len(),
            preview
        ));
        return false;
    }

    if !expected_set.is_empty() && expected_set.len() >= 4 && overlap < 2 && suspicious.len() >= 2 {
        sink(&format!(
            "dependency check failed: low overlap with expected mappings (overlap={}, suspicious={})",
            overlap,
            suspicious.len()
        ));
        return false;
    }

    if !expected_set.is_empty()
        && (overlap as f64 / expected_set.len() as f64) < 0.25
        && suspicious.len() >= 3
    {
        sink(&format!(
            "dependency check failed: dependency names look mangled (overlap={}, suspicious={})",
            overlap,
            suspicious.len()
        ));
        return false;
    }

    true
}

/// Read `depend = ...` entries from a generated package's `.PKGINFO`
fn pkginfo_dependencies(artifact: &Path) -> Result<Vec<String>> {
    let archive = TarArchive::open(artifact)?;
    let content = match archive.read_file(".PKGINFO")? {
        Some(content) => content,
        None => return Ok(Vec::new()),
    };
    let text = String::from_utf8_lossy(&content);
    Ok(text
        .lines()
        .filter_map(|line| line.strip_prefix("depend = "))
        .map(str::trim)
        .filter(|dep| !dep.is_empty())
        .map(str::to_string)
        .collect())
}

/// Dependency name with any `<`/`>`/`=` version relation stripped
fn dependency_base(dep: &str) -> String {
    dep.split(['<', '>', '='])
        .next()
        .unwrap_or(dep)
        .trim()
        .to_lowercase()
}

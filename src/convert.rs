// src/convert.rs

//! The conversion engine orchestrator
//!
//! Drives one run end to end: inspection, metadata parsing, dependency
//! mapping, strategy execution, and workspace lifecycle. Steps run
//! sequentially, each feeding the next; cancellation is honored at the
//! checkpoints between them, and the workspace is torn down on every exit
//! path because the result (or the error path) owns it.

use crate::archive::{ArchiveFormat, ArchiveHandle, FormatHint};
use crate::depmap::{DependencyMapper, DependencyMapping, resolved_names};
use crate::error::{Error, Result};
use crate::exec::LogSink;
use crate::extract::{SkippedEntry, extract_tar};
use crate::metadata::{
    PackageDescriptor, SourceFormat, descriptor_from_tarball_name, parse_control,
};
use crate::recipe::{build_package, payload_root, stage_tarball_payload};
use crate::strategy::{
    DEFAULT_EXTERNAL_TOOL, ExternalConverter, SelectorState, Strategy, delegated_artifact_is_usable,
};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Caller-tunable knobs for a conversion run
pub struct ConvertOptions {
    /// Format detection mode or explicit hint
    pub hint: FormatHint,
    /// Whether Debian input may be delegated to the external tool
    pub delegate: bool,
    /// External converter binary name
    pub external_tool: String,
    /// Override of the temporary root the workspace is created under
    pub temp_root: Option<PathBuf>,
    /// Cooperative cancellation flag, checked between steps
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            hint: FormatHint::Auto,
            delegate: true,
            external_tool: DEFAULT_EXTERNAL_TOOL.to_string(),
            temp_root: None,
            cancel: None,
        }
    }
}

/// Metadata-only view of an input, produced without touching the disk
#[derive(Debug)]
pub struct InspectReport {
    pub format: ArchiveFormat,
    pub descriptor: PackageDescriptor,
    pub mappings: Vec<DependencyMapping>,
}

/// Terminal output of a successful conversion run
///
/// Owns the workspace the artifact lives in: the artifact stays valid until
/// this result is dropped or released, and teardown is guaranteed either way.
pub struct ConversionResult {
    pub artifact: PathBuf,
    pub strategy: Strategy,
    pub descriptor: PackageDescriptor,
    pub mappings: Vec<DependencyMapping>,
    pub skipped: Vec<SkippedEntry>,
    workspace: Workspace,
}

impl ConversionResult {
    /// Tear down the workspace (and the artifact inside it)
    pub fn release(self) {
        self.workspace.release();
    }
}

/// One-shot conversion engine
pub struct Converter {
    mapper: DependencyMapper,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self {
            mapper: DependencyMapper::new(),
        }
    }

    /// Inspect metadata and dependency mappings without converting
    ///
    /// Reads nested members in-memory only, so callers can preview the
    /// report before committing to extraction or any privileged action.
    pub fn inspect(&self, input: &Path, hint: FormatHint) -> Result<InspectReport> {
        let handle = ArchiveHandle::open(input, hint)?;
        let format = handle.format();
        let descriptor = match &handle {
            ArchiveHandle::Deb(deb) => parse_control(&deb.control_file()?)?,
            ArchiveHandle::Tar(_) => descriptor_from_tarball_name(input),
        };
        let mappings = self.mapper.map_all(&descriptor.dependencies);
        Ok(InspectReport {
            format,
            descriptor,
            mappings,
        })
    }

    /// Convert an input package into an installable Arch artifact
    pub fn convert(
        &self,
        input: &Path,
        options: &ConvertOptions,
        sink: LogSink<'_>,
    ) -> Result<ConversionResult> {
        let handle = ArchiveHandle::open(input, options.hint)?;

        checkpoint(options)?;
        let workspace = match &options.temp_root {
            Some(root) => Workspace::acquire_in(root)?,
            None => Workspace::acquire()?,
        };

        match handle {
            ArchiveHandle::Deb(deb) => {
                let descriptor = parse_control(&deb.control_file()?)?;
                let mappings = self.mapper.map_all(&descriptor.dependencies);
                checkpoint(options)?;
                self.convert_deb(deb, descriptor, mappings, workspace, options, sink)
            }
            ArchiveHandle::Tar(tar) => {
                let descriptor = descriptor_from_tarball_name(input);
                checkpoint(options)?;
                self.convert_tarball(tar, descriptor, workspace, options, sink)
            }
        }
    }

    fn convert_deb(
        &self,
        deb: crate::archive::DebArchive,
        descriptor: PackageDescriptor,
        mappings: Vec<DependencyMapping>,
        workspace: Workspace,
        options: &ConvertOptions,
        sink: LogSink<'_>,
    ) -> Result<ConversionResult> {
        let external = ExternalConverter::new(options.external_tool.clone());
        let mut state =
            SelectorState::initial(SourceFormat::Deb, options.delegate, external.available());
        let mut artifact = PathBuf::new();
        let mut skipped = Vec::new();

        loop {
            checkpoint(options)?;
            match state {
                SelectorState::PreferExternal => {
                    let output_dir = workspace.subdir("external")?;
                    match external.convert(deb.path(), &output_dir, &mut *sink) {
                        Ok(path) => {
                            let depends = resolved_names(&mappings);
                            if delegated_artifact_is_usable(&path, &depends, &mut *sink) {
                                artifact = path;
                                state = state.completed();
                            } else {
                                warn!("delegated artifact failed dependency vetting, falling back");
                                sink(&format!(
                                    "{} output failed dependency checks, falling back to manual conversion",
                                    external.program()
                                ));
                                state = state.external_failed();
                            }
                        }
                        Err(e) => {
                            warn!("external conversion failed, falling back: {}", e);
                            sink(&format!(
                                "{} failed, falling back to manual conversion",
                                external.program()
                            ));
                            state = state.external_failed();
                        }
                    }
                }
                SelectorState::Fallback => {
                    let build_dir = workspace.subdir("manual-build")?;
                    let pkgroot = workspace.subdir("manual-build/pkgroot")?;

                    let data = deb.data_archive().map_err(fatal)?;
                    let report = extract_tar(&data, &pkgroot).map_err(fatal)?;
                    skipped = report.skipped;
                    checkpoint(options)?;

                    let depends = resolved_names(&mappings);
                    artifact = build_package(&descriptor, &depends, &build_dir, &mut *sink)
                        .map_err(fatal)?;
                    state = state.completed();
                }
                SelectorState::Done(strategy) => {
                    info!(
                        "converted {} {} via {}",
                        descriptor.name, descriptor.version, strategy
                    );
                    return Ok(ConversionResult {
                        artifact,
                        strategy,
                        descriptor,
                        mappings,
                        skipped,
                        workspace,
                    });
                }
            }
        }
    }

    fn convert_tarball(
        &self,
        tar: crate::archive::TarArchive,
        descriptor: PackageDescriptor,
        workspace: Workspace,
        options: &ConvertOptions,
        sink: LogSink<'_>,
    ) -> Result<ConversionResult> {
        let extract_dir = workspace.subdir("tarball-extract")?;
        let build_dir = workspace.subdir("tarball-build")?;
        let pkgroot = workspace.subdir("tarball-build/pkgroot")?;

        let report = extract_tar(&tar, &extract_dir).map_err(fatal)?;
        checkpoint(options)?;

        let source_root = payload_root(&extract_dir);
        stage_tarball_payload(&source_root, &pkgroot, &descriptor.name, &mut *sink)
            .map_err(fatal)?;
        checkpoint(options)?;

        let artifact = build_package(&descriptor, &[], &build_dir, &mut *sink).map_err(fatal)?;

        info!(
            "converted {} {} via {}",
            descriptor.name,
            descriptor.version,
            Strategy::Fallback
        );
        Ok(ConversionResult {
            artifact,
            strategy: Strategy::Fallback,
            descriptor,
            mappings: Vec::new(),
            skipped: report.skipped,
            workspace,
        })
    }
}

/// Cooperative cancellation checkpoint between steps
fn checkpoint(options: &ConvertOptions) -> Result<()> {
    if let Some(flag) = &options.cancel
        && flag.load(Ordering::Relaxed)
    {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Escalate a fallback-path failure to the terminal run error
///
/// There is no further fallback after the recipe path, so everything except
/// cancellation becomes `ConversionFailed`, diagnostics kept verbatim.
fn fatal(error: Error) -> Error {
    match error {
        Error::Cancelled => Error::Cancelled,
        other => Error::ConversionFailed(other.to_string()),
    }
}

// src/commands.rs
//! Command handlers for the debark CLI

use crate::cli::FormatArg;
use anyhow::{Context, Result, bail};
use debark::archive::FormatHint;
use debark::convert::{ConversionResult, ConvertOptions, Converter, InspectReport};
use debark::depmap::{DependencyMapping, MappingStatus};
use debark::install::install_artifact;
use std::path::{Path, PathBuf};

pub fn cmd_inspect(package: &str, format: FormatArg) -> Result<()> {
    let converter = Converter::new();
    let report = converter
        .inspect(Path::new(package), hint_for(format))
        .with_context(|| format!("failed to inspect {}", package))?;
    print_inspect_report(&report);
    Ok(())
}

pub fn cmd_convert(
    package: &str,
    format: FormatArg,
    output: &str,
    no_delegate: bool,
    external_tool: &str,
) -> Result<()> {
    let result = run_conversion(package, format, no_delegate, external_tool)?;

    let output_dir = PathBuf::from(output);
    std::fs::create_dir_all(&output_dir)?;
    let file_name = result
        .artifact
        .file_name()
        .context("artifact has no file name")?;
    let destination = output_dir.join(file_name);
    std::fs::copy(&result.artifact, &destination)
        .with_context(|| format!("failed to copy artifact to {}", destination.display()))?;
    result.release();

    println!("Artifact written to {}", destination.display());
    Ok(())
}

pub fn cmd_install(
    package: &str,
    format: FormatArg,
    no_delegate: bool,
    external_tool: &str,
) -> Result<()> {
    let result = run_conversion(package, format, no_delegate, external_tool)?;

    let mut sink = |line: &str| println!("{}", line);
    let outcome = install_artifact(&result.artifact, &mut sink)?;
    result.release();

    if !outcome.success {
        bail!("{} (pacman exit code {})", outcome.message, outcome.code);
    }
    println!("{}", outcome.message);
    Ok(())
}

/// Run one conversion with the mapping report rendered before any build
fn run_conversion(
    package: &str,
    format: FormatArg,
    no_delegate: bool,
    external_tool: &str,
) -> Result<ConversionResult> {
    let converter = Converter::new();
    let input = Path::new(package);

    // Surface the dependency report first; unresolved entries are advisory
    // and never block the conversion itself.
    let inspected = converter
        .inspect(input, hint_for(format))
        .with_context(|| format!("failed to inspect {}", package))?;
    print_inspect_report(&inspected);

    let options = ConvertOptions {
        hint: hint_for(format),
        delegate: !no_delegate,
        external_tool: external_tool.to_string(),
        ..ConvertOptions::default()
    };

    let mut sink = |line: &str| println!("{}", line);
    let result = converter
        .convert(input, &options, &mut sink)
        .with_context(|| format!("failed to convert {}", package))?;

    if !result.skipped.is_empty() {
        println!(
            "Warning: {} archive entr{} skipped during extraction:",
            result.skipped.len(),
            if result.skipped.len() == 1 { "y was" } else { "ies were" }
        );
        for skip in &result.skipped {
            println!("  {} ({})", skip.path, skip.reason);
        }
    }

    println!(
        "Converted {} {} via {}",
        result.descriptor.name, result.descriptor.version, result.strategy
    );
    Ok(result)
}

fn print_inspect_report(report: &InspectReport) {
    let descriptor = &report.descriptor;
    println!("Package:      {}", descriptor.name);
    println!("Version:      {}", descriptor.version);
    println!("Architecture: {}", descriptor.architecture);
    println!("Format:       {}", report.format.name());
    println!("Description:  {}", descriptor.description);

    if report.mappings.is_empty() {
        println!("Dependencies: none declared");
        return;
    }

    println!("Dependencies:");
    for mapping in &report.mappings {
        println!("  {}", render_mapping(mapping));
    }

    let unresolved = report
        .mappings
        .iter()
        .filter(|m| m.status == MappingStatus::Unresolved)
        .count();
    if unresolved > 0 {
        println!(
            "Warning: {} of {} dependencies have no known Arch equivalent",
            unresolved,
            report.mappings.len()
        );
    }
}

fn render_mapping(mapping: &DependencyMapping) -> String {
    let constraint = mapping
        .source
        .version_constraint
        .as_deref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    match &mapping.resolved_name {
        Some(resolved) => format!(
            "{}{} -> {}",
            mapping.source.raw_name, constraint, resolved
        ),
        None => format!("{}{} -> unresolved", mapping.source.raw_name, constraint),
    }
}

fn hint_for(format: FormatArg) -> FormatHint {
    match format {
        FormatArg::Auto => FormatHint::Auto,
        FormatArg::Deb => FormatHint::Deb,
        FormatArg::Tarball => FormatHint::Tarball,
    }
}

// src/metadata.rs

//! Package metadata parsing and normalization
//!
//! Produces the immutable [`PackageDescriptor`] for a conversion run, either
//! from a Debian control block or synthesized from a tarball's filename and
//! layout. Name, version, and architecture are normalized to values the Arch
//! build toolchain will accept.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static VERSION_CONSTRAINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").unwrap());
static NAME_SANITIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9@._+-]").unwrap());
static PKGVER_SANITIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.+_]").unwrap());
static DOT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());

/// Which input family the descriptor was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Deb,
    Tarball,
}

impl SourceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deb => "deb",
            Self::Tarball => "tarball",
        }
    }
}

/// One source-declared dependency, order preserved from the metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Dependency name as declared (first alternative of any `|` group)
    pub raw_name: String,
    /// Version constraint with the operator kept, e.g. `>=1.2`
    pub version_constraint: Option<String>,
}

/// Normalized package metadata, created once per run and read-only after
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub description: String,
    pub maintainer: String,
    pub dependencies: Vec<DependencySpec>,
    pub source_format: SourceFormat,
}

/// Parse a Debian control block into a descriptor
///
/// `Package` and `Version` are mandatory; everything else degrades to a
/// default since downstream steps tolerate partial metadata.
pub fn parse_control(text: &str) -> Result<PackageDescriptor> {
    let fields = parse_control_fields(text);

    let name = fields
        .get("package")
        .map(|v| sanitize_package_name(v))
        .ok_or_else(|| Error::MalformedMetadata("control block has no Package field".into()))?;
    let version = fields
        .get("version")
        .map(|v| sanitize_pkgver(v))
        .ok_or_else(|| Error::MalformedMetadata("control block has no Version field".into()))?;

    let architecture = map_architecture(fields.get("architecture").map(String::as_str).unwrap_or(""));
    let description = fields
        .get("description")
        .cloned()
        .unwrap_or_else(|| "Converted Debian package".to_string());
    let maintainer = fields
        .get("maintainer")
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());
    let dependencies = parse_depends(fields.get("depends").map(String::as_str).unwrap_or(""));

    Ok(PackageDescriptor {
        name,
        version,
        architecture,
        description,
        maintainer,
        dependencies,
        source_format: SourceFormat::Deb,
    })
}

/// Fold a control block into a lowercase key -> value map
///
/// Continuation lines (leading whitespace) append to the previous field,
/// the way multi-line Description blocks are encoded.
fn parse_control_fields(text: &str) -> HashMap<String, String> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut current_key: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(|c: char| c.is_whitespace()) {
            if let Some(key) = &current_key
                && let Some(value) = fields.get_mut(key)
            {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        fields.insert(key.clone(), value.trim().to_string());
        current_key = Some(key);
    }

    fields
}

/// Parse a Debian `Depends` field into ordered dependency specs
///
/// Splits on `,`, keeps the first alternative of each `|` group, captures
/// the parenthesized version constraint, and strips `:arch` qualifiers.
pub fn parse_depends(field: &str) -> Vec<DependencySpec> {
    let mut out = Vec::new();

    for raw_item in field.split(',') {
        let item = raw_item.trim();
        if item.is_empty() {
            continue;
        }

        let preferred = item.split('|').next().unwrap_or(item).trim();

        let constraint = VERSION_CONSTRAINT_RE
            .captures(preferred)
            .map(|caps| caps[1].split_whitespace().collect::<String>())
            .filter(|c| !c.is_empty());

        let name = VERSION_CONSTRAINT_RE.replace(preferred, "");
        let name = name.trim();
        let name = name.split(':').next().unwrap_or(name).trim();
        if name.is_empty() {
            continue;
        }

        out.push(DependencySpec {
            raw_name: name.to_string(),
            version_constraint: constraint,
        });
    }

    out
}

/// Synthesize a descriptor for a tarball bundle from its filename
///
/// Name and version split at the first digit-bearing token; architecture is
/// guessed from common markers, defaulting to `any`.
pub fn descriptor_from_tarball_name(path: &Path) -> PackageDescriptor {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = strip_tarball_suffix(&filename);

    let tokens: Vec<&str> = base
        .split(['-', '_'])
        .filter(|token| !token.is_empty())
        .collect();
    let version_index = tokens
        .iter()
        .position(|token| token.chars().any(|c| c.is_ascii_digit()));

    let (name, version) = match version_index {
        None => (sanitize_package_name(base), "1.0.0".to_string()),
        Some(idx) => {
            let name_part = tokens[..idx].join("-");
            let version_part = tokens[idx..].join("-");
            (
                sanitize_package_name(if name_part.is_empty() { base } else { &name_part }),
                sanitize_pkgver(if version_part.is_empty() { "1.0.0" } else { &version_part }),
            )
        }
    };

    let lower = base.to_lowercase();
    let architecture = if ["x86_64", "amd64", "x64"].iter().any(|m| lower.contains(m)) {
        "x86_64"
    } else if ["aarch64", "arm64"].iter().any(|m| lower.contains(m)) {
        "aarch64"
    } else if ["i386", "i686"].iter().any(|m| lower.contains(m)) {
        "i686"
    } else {
        "any"
    };

    PackageDescriptor {
        name,
        version,
        architecture: architecture.to_string(),
        description: format!("Repackaged application bundle from {}", filename),
        maintainer: "Unknown".to_string(),
        dependencies: Vec::new(),
        source_format: SourceFormat::Tarball,
    }
}

fn strip_tarball_suffix(filename: &str) -> &str {
    let lower = filename.to_lowercase();
    for suffix in [".tar.gz", ".tgz", ".tar"] {
        if lower.ends_with(suffix) {
            return &filename[..filename.len() - suffix.len()];
        }
    }
    filename
}

/// Reduce a name to the Arch pkgname alphabet
pub fn sanitize_package_name(name: &str) -> String {
    let cleaned = NAME_SANITIZE_RE.replace_all(name, "-");
    let cleaned = cleaned.trim_matches(['-', '.', '_']).to_lowercase();
    if cleaned.is_empty() {
        "unknown-package".to_string()
    } else {
        cleaned
    }
}

/// Reduce a version string to an Arch pkgver-safe value
///
/// pkgver must not contain hyphens, colons, or spaces; the Debian epoch is
/// dropped and `~`/`-` become dots.
pub fn sanitize_pkgver(version: &str) -> String {
    if version.is_empty() {
        return "0".to_string();
    }

    let no_epoch = version.rsplit_once(':').map(|(_, v)| v).unwrap_or(version);
    let cleaned = no_epoch.replace(['~', '-'], ".");
    let cleaned = PKGVER_SANITIZE_RE.replace_all(&cleaned, ".");
    let cleaned = DOT_RUN_RE.replace_all(&cleaned, ".");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "0".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Map a Debian architecture token to its Arch equivalent
pub fn map_architecture(deb_arch: &str) -> String {
    match deb_arch.trim().to_lowercase().as_str() {
        "" => "any".to_string(),
        "all" => "any".to_string(),
        "amd64" => "x86_64".to_string(),
        "arm64" => "aarch64".to_string(),
        "armhf" => "armv7h".to_string(),
        "i386" => "i686".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_minimal_control() {
        let descriptor = parse_control("Package: hello\nVersion: 2.10-3\n").unwrap();
        assert_eq!(descriptor.name, "hello");
        assert_eq!(descriptor.version, "2.10.3");
        assert_eq!(descriptor.architecture, "any");
        assert_eq!(descriptor.source_format, SourceFormat::Deb);
        assert!(descriptor.dependencies.is_empty());
    }

    #[test]
    fn missing_mandatory_fields_fail() {
        assert!(matches!(
            parse_control("Version: 1.0\n"),
            Err(Error::MalformedMetadata(_))
        ));
        assert!(matches!(
            parse_control("Package: hello\n"),
            Err(Error::MalformedMetadata(_))
        ));
    }

    #[test]
    fn folds_continuation_lines() {
        let control = "Package: hello\nVersion: 1.0\nDescription: a tool\n that does things\n";
        let descriptor = parse_control(control).unwrap();
        assert_eq!(descriptor.description, "a tool that does things");
    }

    #[test]
    fn depends_field_splits_and_keeps_constraints() {
        let specs = parse_depends("libfoo (>= 1.2), libbar");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].raw_name, "libfoo");
        assert_eq!(specs[0].version_constraint.as_deref(), Some(">=1.2"));
        assert_eq!(specs[1].raw_name, "libbar");
        assert_eq!(specs[1].version_constraint, None);
    }

    #[test]
    fn depends_takes_first_alternative_and_strips_arch() {
        let specs = parse_depends("libgtk-3-0 | libgtk-3-1, python3:any (<< 4)");
        assert_eq!(specs[0].raw_name, "libgtk-3-0");
        assert_eq!(specs[1].raw_name, "python3");
        assert_eq!(specs[1].version_constraint.as_deref(), Some("<<4"));
    }

    #[test]
    fn depends_order_is_preserved() {
        let specs = parse_depends("zebra, alpha, middle");
        let names: Vec<&str> = specs.iter().map(|s| s.raw_name.as_str()).collect();
        assert_eq!(names, vec!["zebra", "alpha", "middle"]);
    }

    #[test]
    fn architecture_mapping() {
        let control = "Package: hello\nVersion: 1.0\nArchitecture: amd64\n";
        assert_eq!(parse_control(control).unwrap().architecture, "x86_64");
        assert_eq!(map_architecture("all"), "any");
        assert_eq!(map_architecture("armhf"), "armv7h");
        assert_eq!(map_architecture("riscv64"), "riscv64");
    }

    #[test]
    fn pkgver_sanitization() {
        assert_eq!(sanitize_pkgver("1:2.10-3ubuntu1"), "2.10.3ubuntu1");
        assert_eq!(sanitize_pkgver("1.0~beta2"), "1.0.beta2");
        assert_eq!(sanitize_pkgver(""), "0");
    }

    #[test]
    fn package_name_sanitization() {
        assert_eq!(sanitize_package_name("My App!"), "my-app");
        assert_eq!(sanitize_package_name("---"), "unknown-package");
    }

    #[test]
    fn tarball_descriptor_from_filename() {
        let descriptor =
            descriptor_from_tarball_name(&PathBuf::from("/x/myapp-2.3.1-linux-x86_64.tar.gz"));
        assert_eq!(descriptor.name, "myapp");
        // `_` splits tokens just like `-`, so the arch marker ends up dotted
        assert_eq!(descriptor.version, "2.3.1.linux.x86.64");
        assert_eq!(descriptor.architecture, "x86_64");
        assert_eq!(descriptor.source_format, SourceFormat::Tarball);
        assert!(descriptor.dependencies.is_empty());
    }

    #[test]
    fn tarball_descriptor_without_version() {
        let descriptor = descriptor_from_tarball_name(&PathBuf::from("tool.tgz"));
        assert_eq!(descriptor.name, "tool");
        assert_eq!(descriptor.version, "1.0.0");
        assert_eq!(descriptor.architecture, "any");
    }
}

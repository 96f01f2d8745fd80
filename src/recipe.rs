// src/recipe.rs

//! Build recipe synthesis and toolchain invocation
//!
//! The fallback path wraps an extracted payload in a minimal PKGBUILD and
//! hands it to `makepkg`. The recipe does no building of its own: the
//! payload is staged under a `pkgroot` tree and the generated `package()`
//! copies it verbatim into `$pkgdir`. Toolchain diagnostics stream through
//! unmodified; for packaging edge cases they are the only useful output.

use crate::error::{Error, Result};
use crate::exec::{LogSink, run_streamed};
use crate::metadata::PackageDescriptor;
use crate::strategy::newest_artifact;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Architectures makepkg will accept in an arch=() array
const KNOWN_ARCHES: &[&str] = &["any", "x86_64", "aarch64", "armv7h", "i686"];

/// Single-quote a value for safe embedding in a PKGBUILD
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Render a minimal PKGBUILD wrapping a prepared `pkgroot` payload
pub fn render_pkgbuild(descriptor: &PackageDescriptor, depends: &[String]) -> String {
    let depends_line = if depends.is_empty() {
        "depends=()".to_string()
    } else {
        let entries: Vec<String> = depends.iter().map(|d| shell_quote(d)).collect();
        format!("depends=({})", entries.join(" "))
    };

    let arch = if KNOWN_ARCHES.contains(&descriptor.architecture.as_str()) {
        descriptor.architecture.as_str()
    } else {
        "any"
    };

    let mut pkgdesc = descriptor.description.clone();
    if pkgdesc.is_empty() {
        pkgdesc = "Converted package".to_string();
    }
    if pkgdesc.len() > 120 {
        let mut cut = 117;
        while !pkgdesc.is_char_boundary(cut) {
            cut -= 1;
        }
        pkgdesc.truncate(cut);
        pkgdesc.push_str("...");
    }

    format!(
        r#"# Maintainer: debark
pkgname={pkgname}
pkgver={pkgver}
pkgrel=1
pkgdesc={pkgdesc}
arch=({arch})
license=('custom')
{depends_line}
options=('!strip' '!debug')
source=()
sha256sums=()

package() {{
    cp -a "$startdir/pkgroot/." "$pkgdir/"
}}
"#,
        pkgname = shell_quote(&descriptor.name),
        pkgver = shell_quote(&descriptor.version),
        pkgdesc = shell_quote(&pkgdesc),
        arch = shell_quote(arch),
    )
}

/// Write the recipe and run makepkg against a prepared build directory
///
/// `build_dir` must already contain the staged `pkgroot` tree. Returns the
/// path of the generated artifact inside `build_dir`.
pub fn build_package(
    descriptor: &PackageDescriptor,
    depends: &[String],
    build_dir: &Path,
    sink: LogSink<'_>,
) -> Result<PathBuf> {
    let pkgbuild = render_pkgbuild(descriptor, depends);
    fs::write(build_dir.join("PKGBUILD"), pkgbuild)?;

    let started_at = SystemTime::now() - Duration::from_secs(2);
    info!("running makepkg for {}", descriptor.name);
    let output = run_streamed(
        "makepkg",
        &["--nodeps", "--force", "--clean"],
        Some(build_dir),
        &[],
        sink,
    )
    .map_err(|e| Error::BuildToolchain(e.to_string()))?;

    if !output.success() {
        return Err(Error::BuildToolchain(format!(
            "makepkg exited with code {}\n{}",
            output.code,
            output.joined()
        )));
    }

    newest_artifact(build_dir, started_at).ok_or_else(|| {
        Error::BuildToolchain("makepkg succeeded but no package artifact was generated".into())
    })
}

/// Collapse a single top-level directory wrapper, if the payload has one
///
/// Tarball bundles conventionally ship everything under `name-version/`;
/// that wrapper should not end up inside `/opt/<name>`.
pub fn payload_root(extract_dir: &Path) -> PathBuf {
    let mut entries: Vec<PathBuf> = match fs::read_dir(extract_dir) {
        Ok(iter) => iter
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect(),
        Err(_) => return extract_dir.to_path_buf(),
    };
    entries.sort();

    match entries.as_slice() {
        [single] if single.is_dir() => single.clone(),
        _ => extract_dir.to_path_buf(),
    }
}

/// Stage a tarball payload under `pkgroot/opt/<name>` with a launcher link
///
/// If a plausible primary executable is found, a `/usr/bin/<name>` symlink
/// pointing into `/opt/<name>` is added so the application lands on PATH.
pub fn stage_tarball_payload(
    source_root: &Path,
    pkgroot: &Path,
    package_name: &str,
    sink: LogSink<'_>,
) -> Result<()> {
    let install_root = pkgroot.join("opt").join(package_name);
    copy_tree(source_root, &install_root)?;

    if let Some(primary) = pick_primary_executable(&install_root, package_name) {
        let relative = primary
            .strip_prefix(&install_root)
            .map_err(|_| Error::InvalidPath(primary.to_string_lossy().into_owned()))?
            .to_path_buf();
        let bin_dir = pkgroot.join("usr/bin");
        fs::create_dir_all(&bin_dir)?;
        let launcher = bin_dir.join(package_name);
        let _ = fs::remove_file(&launcher);
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            Path::new("/opt").join(package_name).join(&relative),
            &launcher,
        )?;
        info!("created launcher /usr/bin/{}", package_name);
        sink(&format!("created launcher: /usr/bin/{}", package_name));
    } else {
        debug!("no primary executable found for {}", package_name);
    }

    Ok(())
}

/// Copy a directory tree, preserving permissions and relative symlinks
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::InvalidPath(entry.path().to_string_lossy().into_owned()))?;
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            let _ = fs::remove_file(&target);
            #[cfg(unix)]
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Heuristically choose the application's entry point executable
///
/// Preference order: a file named like the package, then a shallow
/// extension-less executable, then the first executable found. Only files
/// within four path components of the root are considered.
pub fn pick_primary_executable(install_root: &Path, package_name: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(install_root)
        .min_depth(1)
        .max_depth(4)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if is_executable(entry.path()) {
            candidates.push(entry.into_path());
        }
    }

    if candidates.is_empty() {
        return None;
    }

    let preferred = [
        package_name.to_string(),
        package_name.replace('-', ""),
        package_name.replace('-', "_"),
    ];
    if let Some(hit) = candidates.iter().find(|path| {
        path.file_name()
            .map(|n| preferred.iter().any(|p| n.to_string_lossy() == *p))
            .unwrap_or(false)
    }) {
        return Some(hit.clone());
    }

    if let Some(hit) = candidates.iter().find(|path| {
        let Ok(relative) = path.strip_prefix(install_root) else {
            return false;
        };
        relative.components().count() == 1
            && !path.file_name().unwrap_or_default().to_string_lossy().contains('.')
    }) {
        return Some(hit.clone());
    }

    Some(candidates.remove(0))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

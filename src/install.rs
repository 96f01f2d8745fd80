// src/install.rs

//! Privileged installation of converted artifacts
//!
//! The engine hands off a finished artifact; this collaborator drives the
//! actual `pacman -U` step with whatever elevation is available (already
//! root, then pkexec, then sudo) and streams pacman's output to the log
//! sink. Common pacman failure modes are classified into friendlier
//! messages, with the raw output always passed through.

use crate::error::{Error, Result};
use crate::exec::{LogSink, command_exists, run_streamed};
use std::path::Path;
use tracing::info;

/// Structured result of a pacman installation attempt
#[derive(Debug)]
pub struct InstallOutcome {
    pub success: bool,
    pub code: i32,
    pub message: String,
}

/// Install a built Arch package via pacman with privilege elevation
pub fn install_artifact(artifact: &Path, sink: LogSink<'_>) -> Result<InstallOutcome> {
    if !artifact.is_file() {
        return Err(Error::Install(format!(
            "artifact does not exist: {}",
            artifact.display()
        )));
    }

    let artifact_arg = artifact.to_string_lossy().into_owned();
    let pacman_args = ["-U", "--needed", "--noconfirm", artifact_arg.as_str()];

    let (program, args): (&str, Vec<&str>) = if is_root() {
        ("pacman", pacman_args.to_vec())
    } else if command_exists("pkexec") {
        let mut args = vec!["pacman"];
        args.extend(pacman_args);
        ("pkexec", args)
    } else if command_exists("sudo") {
        let mut args = vec!["pacman"];
        args.extend(pacman_args);
        ("sudo", args)
    } else {
        return Err(Error::Install(
            "neither pkexec nor sudo is available for privilege elevation".into(),
        ));
    };

    info!("installing {} via {}", artifact.display(), program);
    let output = run_streamed(program, &args, None, &[], sink)?;

    if output.success() {
        return Ok(InstallOutcome {
            success: true,
            code: 0,
            message: "installation completed successfully".into(),
        });
    }

    Ok(InstallOutcome {
        success: false,
        code: output.code,
        message: classify_failure(&output.joined().to_lowercase()),
    })
}

/// Map pacman's output to an actionable failure summary
fn classify_failure(output: &str) -> String {
    if output.contains("unable to lock database") || output.contains("failed to init transaction")
    {
        "pacman database is locked; close other package managers and retry".into()
    } else if output.contains("target not found")
        || output.contains("could not satisfy dependencies")
        || output.contains("dependencies could not be resolved")
    {
        "dependency resolution failed during installation".into()
    } else if output.contains("conflicting dependencies") || output.contains("breaks dependency") {
        "version or dependency conflict detected".into()
    } else if output.contains("conflicting files") || output.contains("exists in filesystem") {
        "file conflict detected; remove the conflicting files or package and retry".into()
    } else if output.contains("invalid or corrupted package") {
        "pacman rejected the artifact as invalid or corrupted".into()
    } else {
        "pacman installation failed; see the log output above".into()
    }
}

fn is_root() -> bool {
    // Safety: geteuid has no failure modes and touches no memory
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_an_install_error() {
        let result = install_artifact(Path::new("/nonexistent/pkg.tar.zst"), &mut |_| {});
        assert!(matches!(result, Err(Error::Install(_))));
    }

    #[test]
    fn failure_classification() {
        assert!(classify_failure("error: unable to lock database").contains("locked"));
        assert!(classify_failure("error: target not found: libfoo").contains("dependency"));
        assert!(classify_failure("/usr/bin/x exists in filesystem").contains("file conflict"));
        assert!(classify_failure("something odd").contains("see the log"));
    }
}

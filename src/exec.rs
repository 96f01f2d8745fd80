// src/exec.rs

//! Subprocess execution with line-streamed output
//!
//! External collaborators (debtap, makepkg, pacman) produce diagnostics that
//! are often the only actionable output for packaging edge cases, so their
//! combined stdout/stderr is forwarded line by line to a caller-provided
//! sink instead of being summarized.

use crate::error::{Error, Result};
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::sync::mpsc;
use std::thread;
use tracing::debug;

static ANSI_ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~]|[\(\)][0-9A-Za-z])")
        .unwrap()
});

/// Callback receiving each output line as it is produced
///
/// Callers that do not want the output pass a no-op closure.
pub type LogSink<'a> = &'a mut dyn FnMut(&str);

/// Captured result of a finished subprocess
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit code, or -1 when terminated by a signal
    pub code: i32,
    /// Combined stdout/stderr, ANSI escapes stripped
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// Return true if a binary is resolvable on PATH
pub fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Remove ANSI terminal escape codes from a log line
pub fn strip_ansi_escapes(text: &str) -> String {
    ANSI_ESCAPE_RE.replace_all(text, "").to_string()
}

/// Run a command, streaming combined stdout/stderr to `sink`
///
/// A non-zero exit is not an error here; callers inspect `code` so that
/// recoverable failures (external-tool fallback) stay recoverable.
pub fn run_streamed(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
    sink: LogSink<'_>,
) -> Result<CommandOutput> {
    debug!("running command: {} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    for (key, value) in envs {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| {
        Error::CommandFailed(format!("failed to spawn {}: {}", program, e))
    })?;

    let (tx, rx) = mpsc::channel::<String>();

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut readers = Vec::new();
    if let Some(out) = stdout {
        let tx = tx.clone();
        readers.push(thread::spawn(move || drain_lines(out, tx)));
    }
    if let Some(err) = stderr {
        let tx = tx.clone();
        readers.push(thread::spawn(move || drain_lines(err, tx)));
    }
    drop(tx);

    let mut lines = Vec::new();
    for line in rx {
        let cleaned = strip_ansi_escapes(&line);
        let trimmed = cleaned.trim_end();
        if !trimmed.is_empty() {
            debug!("{}: {}", program, trimmed);
            sink(trimmed);
        }
        lines.push(trimmed.to_string());
    }

    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait()?;
    Ok(CommandOutput {
        code: status.code().unwrap_or(-1),
        lines,
    })
}

fn drain_lines(reader: impl std::io::Read, tx: mpsc::Sender<String>) {
    let buffered = BufReader::new(reader);
    for line in buffered.lines() {
        match line {
            Ok(line) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

// src/error.rs

//! Error types for the debark conversion engine

use thiserror::Error;

/// All errors the conversion engine can surface to a caller
#[derive(Debug, Error)]
pub enum Error {
    /// The input file matched none of the supported container formats
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Mandatory control metadata was absent or unparseable
    #[error("malformed package metadata: {0}")]
    MalformedMetadata(String),

    /// An untrusted path tried to escape its extraction root
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// A path was empty or otherwise unusable after sanitization
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The temporary root is missing or not writable
    #[error("workspace unavailable: {0}")]
    WorkspaceUnavailable(String),

    /// makepkg reported failure or produced no artifact
    #[error("build toolchain failed: {0}")]
    BuildToolchain(String),

    /// Terminal failure of the fallback conversion path
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// pacman installation failed
    #[error("installation failed: {0}")]
    Install(String),

    /// A subprocess could not be spawned or exited non-zero
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// The caller aborted the run between steps
    #[error("conversion cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// src/lib.rs

//! debark — package conversion engine
//!
//! Converts foreign Linux binary packages (Debian `.deb`, generic
//! `.tar.gz`/`.tgz` application bundles) into installable Arch-style
//! packages and drives their privileged installation.
//!
//! # Architecture
//!
//! - Archive inspection is read-only and restartable; nothing touches the
//!   disk until the caller commits to extraction
//! - Extraction of untrusted content is sandboxed to a single-use
//!   workspace with per-entry path, symlink, and entry-type checks
//! - Strategy selection is an explicit two-state machine: delegate to an
//!   external converter when possible, fall back to a generated PKGBUILD
//! - Dependency-name translation is best-effort and purely local; the
//!   mapping report is complete before any privileged action

pub mod archive;
pub mod convert;
pub mod depmap;
mod error;
pub mod exec;
pub mod extract;
pub mod install;
pub mod metadata;
pub mod paths;
pub mod recipe;
pub mod strategy;
pub mod workspace;

pub use convert::{ConversionResult, ConvertOptions, Converter, InspectReport};
pub use depmap::{DependencyMapper, DependencyMapping, MappingStatus};
pub use error::{Error, Result};
pub use metadata::{DependencySpec, PackageDescriptor, SourceFormat};
pub use strategy::{SelectorState, Strategy};
pub use workspace::Workspace;

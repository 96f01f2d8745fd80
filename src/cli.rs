// src/cli.rs

//! CLI definitions for debark
//!
//! Command-line interface definitions using clap. The actual command
//! implementations are in the `commands` module.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "debark")]
#[command(version)]
#[command(
    about = "Convert Debian packages and tarball bundles into installable Arch packages",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Input format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Detect by content signature
    Auto,
    /// Treat the input as a Debian package
    Deb,
    /// Treat the input as a tarball bundle
    Tarball,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show package metadata and the dependency mapping report
    Inspect {
        /// Path to the package file (.deb, .tar.gz, .tgz)
        package: String,

        /// Input format (default: detect by content)
        #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
        format: FormatArg,
    },

    /// Convert a package into a .pkg.tar.zst artifact without installing
    Convert {
        /// Path to the package file (.deb, .tar.gz, .tgz)
        package: String,

        /// Input format (default: detect by content)
        #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
        format: FormatArg,

        /// Directory the finished artifact is copied to
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Skip external tool delegation and always use the recipe path
        #[arg(long)]
        no_delegate: bool,

        /// External converter binary to delegate Debian input to
        #[arg(long, default_value = "debtap")]
        external_tool: String,
    },

    /// Convert a package and install the result via pacman
    Install {
        /// Path to the package file (.deb, .tar.gz, .tgz)
        package: String,

        /// Input format (default: detect by content)
        #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
        format: FormatArg,

        /// Skip external tool delegation and always use the recipe path
        #[arg(long)]
        no_delegate: bool,

        /// External converter binary to delegate Debian input to
        #[arg(long, default_value = "debtap")]
        external_tool: String,
    },
}

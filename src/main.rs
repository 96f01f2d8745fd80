// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { package, format } => commands::cmd_inspect(&package, format),
        Commands::Convert {
            package,
            format,
            output,
            no_delegate,
            external_tool,
        } => commands::cmd_convert(&package, format, &output, no_delegate, &external_tool),
        Commands::Install {
            package,
            format,
            no_delegate,
            external_tool,
        } => commands::cmd_install(&package, format, no_delegate, &external_tool),
    }
}

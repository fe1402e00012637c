//! UniText CLI - command-line front end for scanning and injection

pub mod commands;
pub mod progress;

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;

use crate::config::ToolConfig;

#[derive(Parser)]
#[command(name = "unitext")]
#[command(about = "UniText: Unity text extraction and re-injection", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./unitext.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Run the UniText CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    let config = ToolConfig::load_or_default(cli.config.as_deref())?;
    cli.command.execute(&config)?;

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod cli;
mod config;
mod render;
mod transcript;

use crate::config::LabConfig;

#[derive(Parser)]
#[command(name = "lab")]
#[command(about = "Follow live research investigations from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory (defaults to ~/.lab-console)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream an investigation and print its progress until it finishes
    Watch(WatchArgs),

    /// Project a recorded SSE transcript offline
    Replay(ReplayArgs),

    /// Print the resolved configuration as TOML
    Config,
}

#[derive(Parser)]
struct WatchArgs {
    /// Investigation id or full stream URL
    target: String,

    /// Print events as JSON lines and the final state as JSON
    #[arg(long)]
    json: bool,

    /// Save the received events as a transcript in the data directory
    #[arg(long)]
    record: bool,
}

#[derive(Parser)]
struct ReplayArgs {
    /// Transcript file (text/event-stream format)
    file: PathBuf,

    /// Print the projected state as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging (stderr, so stdout stays clean for --json)
    let default_directive = if cli.debug {
        "lab_console=debug,investigation_sync=debug,info"
    } else {
        "lab_console=info,investigation_sync=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let config = LabConfig::new(cli.data_dir)?;
    let file_config = config::extract_config(&config.data_dir)?;

    match cli.command {
        Commands::Watch(args) => {
            cli::watch_command(&config, &file_config, args.target, args.json, args.record).await
        }
        Commands::Replay(args) => cli::replay_command(&args.file, args.json),
        Commands::Config => cli::config_command(&config, &file_config),
    }
}

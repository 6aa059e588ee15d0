//! LightCard - Main Entry Point

use clap::Parser;
use lightcard::cli::{Cli, Command};
use lightcard::{init_logging, init_metrics, run_replay, run_send, run_server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    init_logging(&settings.logging)?;
    info!("=== LightCard v{} ===", env!("CARGO_PKG_VERSION"));
    init_metrics(&settings.metrics)?;

    match cli.command {
        Command::Serve { .. } => {
            run_server(&settings).await?;
        }
        Command::Replay { .. } => {
            let replay = settings.replay.clone();
            tokio::task::spawn_blocking(move || run_replay(&replay)).await??;
        }
        Command::Send { .. } => {
            run_send(&settings).await?;
        }
    }

    Ok(())
}

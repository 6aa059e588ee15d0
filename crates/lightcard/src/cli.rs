//! Command Line

use crate::settings::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Serve a prediction model over a framed TCP link, or replay stored test
/// sets against local models
#[derive(Debug, Parser)]
#[command(name = "lightcard", version, about)]
pub struct Cli {
    /// Settings file (TOML); `lightcard.toml` is used when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept one peer and answer its requests until it leaves or times out
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Model artifact to serve
        #[arg(long)]
        model: Option<PathBuf>,
        /// Latency sink
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay stored feature tables against local models
    Replay {
        #[arg(long)]
        experiments: Option<u32>,
        #[arg(long)]
        classes: Option<u32>,
    },
    /// Stream a stored feature table to a running server
    Send {
        /// Server address (`host:port`)
        #[arg(long)]
        addr: Option<String>,
        /// Feature table (.npy)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Round-trip latency sink
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Load settings and apply command-line overrides on top
    pub fn settings(&self) -> Result<Settings, config::ConfigError> {
        let mut settings = Settings::load(self.config.as_deref())?;
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) {
        match &self.command {
            Command::Serve {
                host,
                port,
                model,
                output,
            } => {
                if let Some(host) = host {
                    settings.server.host = host.clone();
                }
                if let Some(port) = port {
                    settings.server.port = *port;
                }
                if let Some(model) = model {
                    settings.server.model_path = model.clone();
                }
                if let Some(output) = output {
                    settings.server.output_path = output.clone();
                }
            }
            Command::Replay {
                experiments,
                classes,
            } => {
                if let Some(experiments) = experiments {
                    settings.replay.experiments = *experiments;
                }
                if let Some(classes) = classes {
                    settings.replay.classes = *classes;
                }
            }
            Command::Send { addr, data, output } => {
                if let Some(addr) = addr {
                    settings.client.server_addr = addr.clone();
                }
                if let Some(data) = data {
                    settings.client.test_data_path = data.clone();
                }
                if let Some(output) = output {
                    settings.client.output_path = output.clone();
                }
            }
        }
    }
}

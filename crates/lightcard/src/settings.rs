//! Process Settings
//!
//! Defaults, then an optional TOML file, then `LIGHTCARD__*` environment
//! variables (`LIGHTCARD__SERVER__PORT=6000`).

use batch_replay::{BatchJob, JobTemplate, DEFAULT_METADATA_COLUMNS};
use config::{Config, ConfigError, Environment, File};
use frame_protocol::DEFAULT_MAX_FRAME_BYTES;
use live_session::SessionConfig;
use payload_codec::WireFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "lightcard.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LIGHTCARD";

/// Complete process settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub server: ServerSettings,
    pub replay: ReplaySettings,
    pub client: ClientSettings,
    pub metrics: MetricsSettings,
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Live serving mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub output_path: PathBuf,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: Option<u64>,
    pub max_frame_bytes: usize,
    pub max_consecutive_send_failures: Option<u32>,
    pub wire_format: WireFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: PathBuf::from("models/model_F1.1__results_class1.json"),
            output_path: PathBuf::from("results/LC_times_E1.1_C1.csv"),
            read_timeout_secs: 10,
            write_timeout_secs: Some(10),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            max_consecutive_send_failures: Some(3),
            wire_format: WireFormat::Postcard,
        }
    }
}

impl ServerSettings {
    /// Session tuning derived from these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            write_timeout: self.write_timeout_secs.map(Duration::from_secs),
            max_frame_bytes: self.max_frame_bytes,
            wire_format: self.wire_format,
            max_consecutive_send_failures: self.max_consecutive_send_failures,
        }
    }
}

/// Offline replay mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Number of experiments the template expands over
    pub experiments: u32,
    /// Number of classes per experiment
    pub classes: u32,
    pub template: JobTemplate,
    /// Explicit job list; replaces template expansion when non-empty
    pub jobs: Vec<BatchJob>,
    pub metadata_columns: usize,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            experiments: 1,
            classes: 1,
            template: JobTemplate {
                model: "models/model_F1.{experiment}__results_class{class}.json".to_string(),
                test_data: "test_sets/F1.{experiment}__results_class{class}_test.npy".to_string(),
                output: "results/LC_times_E1.{experiment}_C{class}.csv".to_string(),
            },
            jobs: Vec::new(),
            metadata_columns: DEFAULT_METADATA_COLUMNS,
        }
    }
}

impl ReplaySettings {
    /// Ordered job list to run
    pub fn jobs(&self) -> Vec<BatchJob> {
        if self.jobs.is_empty() {
            self.template.expand(self.experiments, self.classes)
        } else {
            self.jobs.clone()
        }
    }
}

/// Remote client mode (streams a stored table to a live server)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub server_addr: String,
    pub test_data_path: PathBuf,
    /// Round-trip latency sink
    pub output_path: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5000".to_string(),
            test_data_path: PathBuf::from("test_sets/F1.1__results_class1_test.npy"),
            output_path: PathBuf::from("results/LC_roundtrip_E1.1_C1.csv"),
        }
    }
}

/// Prometheus exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// `host:port` for the scrape endpoint; disabled when unset
    pub listen_addr: Option<String>,
}

impl Settings {
    /// Layer the config file (required only when given explicitly) and the
    /// environment over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

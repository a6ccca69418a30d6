use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::market_data::adapters::coinbase::DEFAULT_WS_URL;
use crate::market_data::adapters::rest::Provider;

pub const DEFAULT_CONFIG_FILE: &str = "depthx";
pub const ENV_PREFIX: &str = "DEPTHX";

/// Runtime settings. Sources, lowest priority first: built-in defaults,
/// `depthx.toml` (or `--config`), `DEPTHX_*` environment variables, CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// REST provider used by `poll`.
    pub provider: Provider,
    pub symbol: String,
    pub out_csv: PathBuf,
    pub depth_path: Option<PathBuf>,
    /// Levels per side in each depth snapshot.
    pub depth_levels: usize,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Minimum gap between depth file writes.
    pub dump_interval_ms: u64,
    pub ws_url: String,
    pub ws_idle_timeout_secs: u64,
    pub channel_buffer: usize,
    pub log_filter: String,
    pub metrics_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::Coinbase,
            symbol: "BTC-USD".to_string(),
            out_csv: PathBuf::from("tob.csv"),
            depth_path: None,
            depth_levels: 40,
            poll_interval_ms: 1_000,
            request_timeout_ms: 5_000,
            dump_interval_ms: 200,
            ws_url: DEFAULT_WS_URL.to_string(),
            ws_idle_timeout_secs: 30,
            channel_buffer: 4_096,
            log_filter: "info".to_string(),
            metrics_port: 9000,
        }
    }
}

impl Settings {
    /// Load from `path` (must exist) or from an optional `depthx.*` in the
    /// working directory, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Message("poll_interval_ms must be > 0".into()));
        }
        if self.ws_idle_timeout_secs == 0 {
            return Err(ConfigError::Message("ws_idle_timeout_secs must be > 0".into()));
        }
        if self.channel_buffer == 0 {
            return Err(ConfigError::Message("channel_buffer must be > 0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn dump_interval(&self) -> Duration {
        Duration::from_millis(self.dump_interval_ms)
    }

    pub fn ws_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_idle_timeout_secs)
    }
}

//! Minimal configuration loading for liveline.
//!
//! Imported by every liveline crate, so dependencies stay minimal.
//!
//! # Usage
//!
//! ```rust,no_run
//! use liveconf::LiveConfig;
//!
//! let config = LiveConfig::load().expect("Failed to load config");
//! println!("Bridge: {}", config.connection.endpoint);
//! println!("Heartbeat: {:?}", config.connection.heartbeat_interval());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/liveline/config.toml` (system)
//! 2. `~/.config/liveline/config.toml` (user)
//! 3. `./liveline.toml` (local override, or an explicit path)
//! 4. Environment variables (`LIVELINE_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [connection]
//! endpoint = "ws://studio.local:9001"
//! heartbeat_interval_ms = 20000
//! max_missed_pongs = 3
//! backoff_base_ms = 1000
//! backoff_max_ms = 30000
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources, FileConfig};
pub use settings::{ConnectionConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete liveline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LiveConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl LiveConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` replacing the local override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = LiveConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# liveline configuration\n\n");

        output.push_str("[connection]\n");
        output.push_str(&format!("endpoint = \"{}\"\n", self.connection.endpoint));
        output.push_str(&format!("client_name = \"{}\"\n", self.connection.client_name));
        output.push_str(&format!(
            "heartbeat_interval_ms = {}\n",
            self.connection.heartbeat_interval_ms
        ));
        output.push_str(&format!(
            "max_missed_pongs = {}\n",
            self.connection.max_missed_pongs
        ));
        output.push_str(&format!(
            "backoff_base_ms = {}\n",
            self.connection.backoff_base_ms
        ));
        output.push_str(&format!("backoff_max_ms = {}\n", self.connection.backoff_max_ms));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}

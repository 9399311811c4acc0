//! Connection and telemetry settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bridge connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Bridge endpoint.
    /// Default: ws://127.0.0.1:9001
    #[serde(default = "ConnectionConfig::default_endpoint")]
    pub endpoint: String,

    /// Name reported in logs.
    /// Default: liveline
    #[serde(default = "ConnectionConfig::default_client_name")]
    pub client_name: String,

    /// Interval between heartbeat pings.
    /// Default: 20000 (20s)
    #[serde(default = "ConnectionConfig::default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Consecutive unanswered pings before the link is treated as dead.
    /// 0 disables the check.
    /// Default: 3
    #[serde(default = "ConnectionConfig::default_max_missed_pongs")]
    pub max_missed_pongs: u32,

    /// First reconnect delay; doubles per attempt.
    /// Default: 1000 (1s)
    #[serde(default = "ConnectionConfig::default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Reconnect delay cap.
    /// Default: 30000 (30s)
    #[serde(default = "ConnectionConfig::default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl ConnectionConfig {
    pub(crate) fn default_endpoint() -> String {
        "ws://127.0.0.1:9001".to_string()
    }

    pub(crate) fn default_client_name() -> String {
        "liveline".to_string()
    }

    pub(crate) fn default_heartbeat_interval_ms() -> u64 {
        20_000
    }

    pub(crate) fn default_max_missed_pongs() -> u32 {
        3
    }

    pub(crate) fn default_backoff_base_ms() -> u64 {
        1_000
    }

    pub(crate) fn default_backoff_max_ms() -> u64 {
        30_000
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            client_name: Self::default_client_name(),
            heartbeat_interval_ms: Self::default_heartbeat_interval_ms(),
            max_missed_pongs: Self::default_max_missed_pongs(),
            backoff_base_ms: Self::default_backoff_base_ms(),
            backoff_max_ms: Self::default_backoff_max_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    pub(crate) fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, ConnectionConfig, LiveConfig, TelemetryConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/liveline/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("liveline/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("liveline.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// The keys one config file sets. Absent keys leave earlier layers alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub client_name: Option<String>,
    pub heartbeat_interval_ms: Option<u64>,
    pub max_missed_pongs: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
    pub log_level: Option<String>,
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string. Unknown keys are ignored.
fn parse_toml(contents: &str, path: &Path) -> Result<FileConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let empty = toml::Table::new();
    let conn = table.get("connection").and_then(|v| v.as_table()).unwrap_or(&empty);
    let telemetry = table.get("telemetry").and_then(|v| v.as_table()).unwrap_or(&empty);

    Ok(FileConfig {
        endpoint: text(conn, "endpoint"),
        client_name: text(conn, "client_name"),
        heartbeat_interval_ms: integer(conn, "heartbeat_interval_ms").map_err(parse_err)?,
        max_missed_pongs: integer(conn, "max_missed_pongs").map_err(parse_err)?,
        backoff_base_ms: integer(conn, "backoff_base_ms").map_err(parse_err)?,
        backoff_max_ms: integer(conn, "backoff_max_ms").map_err(parse_err)?,
        log_level: text(telemetry, "log_level"),
    })
}

fn text(table: &toml::Table, key: &str) -> Option<String> {
    table.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// An integer key that must fit `T` (negative values never do).
fn integer<T: TryFrom<i64>>(table: &toml::Table, key: &str) -> Result<Option<T>, String> {
    match table.get(key).and_then(|v| v.as_integer()) {
        None => Ok(None),
        Some(v) => T::try_from(v)
            .map(Some)
            .map_err(|_| format!("{} out of range: {}", key, v)),
    }
}

/// Overlay the keys `overlay` sets onto `base`.
pub fn merge_configs(base: LiveConfig, overlay: FileConfig) -> LiveConfig {
    let conn = base.connection;
    LiveConfig {
        connection: ConnectionConfig {
            endpoint: overlay.endpoint.unwrap_or(conn.endpoint),
            client_name: overlay.client_name.unwrap_or(conn.client_name),
            heartbeat_interval_ms: overlay
                .heartbeat_interval_ms
                .unwrap_or(conn.heartbeat_interval_ms),
            max_missed_pongs: overlay.max_missed_pongs.unwrap_or(conn.max_missed_pongs),
            backoff_base_ms: overlay.backoff_base_ms.unwrap_or(conn.backoff_base_ms),
            backoff_max_ms: overlay.backoff_max_ms.unwrap_or(conn.backoff_max_ms),
        },
        telemetry: TelemetryConfig {
            log_level: overlay.log_level.unwrap_or(base.telemetry.log_level),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut LiveConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary key lookup. Values that fail to parse
/// are skipped.
pub(crate) fn apply_overrides_from<F>(config: &mut LiveConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("LIVELINE_ENDPOINT") {
        config.connection.endpoint = v;
        sources.env_overrides.push("LIVELINE_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("LIVELINE_HEARTBEAT_MS") {
        if let Ok(ms) = v.parse() {
            config.connection.heartbeat_interval_ms = ms;
            sources.env_overrides.push("LIVELINE_HEARTBEAT_MS".to_string());
        }
    }
    if let Some(v) = lookup("LIVELINE_MAX_MISSED_PONGS") {
        if let Ok(n) = v.parse() {
            config.connection.max_missed_pongs = n;
            sources.env_overrides.push("LIVELINE_MAX_MISSED_PONGS".to_string());
        }
    }
    if let Some(v) = lookup("LIVELINE_BACKOFF_BASE_MS") {
        if let Ok(ms) = v.parse() {
            config.connection.backoff_base_ms = ms;
            sources.env_overrides.push("LIVELINE_BACKOFF_BASE_MS".to_string());
        }
    }
    if let Some(v) = lookup("LIVELINE_BACKOFF_MAX_MS") {
        if let Ok(ms) = v.parse() {
            config.connection.backoff_max_ms = ms;
            sources.env_overrides.push("LIVELINE_BACKOFF_MAX_MS".to_string());
        }
    }

    if let Some(v) = lookup("LIVELINE_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("LIVELINE_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over LIVELINE_LOG_LEVEL
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/liveline/sessions");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("liveline/sessions"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/etc/liveline"), PathBuf::from("/etc/liveline"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[connection]
endpoint = "ws://studio.local:9001"
"#;
        let file = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(file.endpoint.as_deref(), Some("ws://studio.local:9001"));
        assert_eq!(file.heartbeat_interval_ms, None);
        assert_eq!(file.log_level, None);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[connection]
endpoint = "ws://10.0.0.4:9100"
client_name = "stage-left"
heartbeat_interval_ms = 5000
max_missed_pongs = 0
backoff_base_ms = 250
backoff_max_ms = 8000
unknown_key = true

[telemetry]
log_level = "debug,livesync=trace"
"#;
        let file = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(
            file,
            FileConfig {
                endpoint: Some("ws://10.0.0.4:9100".to_string()),
                client_name: Some("stage-left".to_string()),
                heartbeat_interval_ms: Some(5_000),
                max_missed_pongs: Some(0),
                backoff_base_ms: Some(250),
                backoff_max_ms: Some(8_000),
                log_level: Some("debug,livesync=trace".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_rejects_negative() {
        let toml = "[connection]\nbackoff_max_ms = -1\n";
        let err = parse_toml(toml, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("backoff_max_ms"));
    }

    #[test]
    fn test_parse_rejects_oversized_count() {
        let toml = "[connection]\nmax_missed_pongs = 4294967296\n";
        let err = parse_toml(toml, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("max_missed_pongs"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = parse_toml("[connection\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nheartbeat_interval_ms = 1500").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.heartbeat_interval_ms, Some(1_500));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_cli_path_is_discovered_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.toml");
        std::fs::write(&path, "[telemetry]\nlog_level = \"warn\"\n").unwrap();

        let files = discover_config_files_with_override(Some(&path));
        assert_eq!(files.last(), Some(&path));
    }

    #[test]
    fn test_merge_overlay_wins_per_field() {
        let mut base = LiveConfig::default();
        base.connection.endpoint = "ws://system:9001".to_string();
        base.connection.backoff_max_ms = 60_000;

        let overlay = FileConfig {
            endpoint: Some("ws://user:9001".to_string()),
            ..Default::default()
        };

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.connection.endpoint, "ws://user:9001");
        assert_eq!(merged.connection.backoff_max_ms, 60_000);
    }

    #[test]
    fn test_later_file_can_restore_default() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        let local = dir.path().join("liveline.toml");
        std::fs::write(&user, "[connection]\nmax_missed_pongs = 0\n").unwrap();
        std::fs::write(&local, "[connection]\nmax_missed_pongs = 3\n").unwrap();

        let mut config = LiveConfig::default();
        for path in [&user, &local] {
            config = merge_configs(config, load_from_file(path).unwrap());
        }
        assert_eq!(config.connection.max_missed_pongs, 3);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LIVELINE_ENDPOINT", "ws://env:9001"),
            ("LIVELINE_HEARTBEAT_MS", "not-a-number"),
            ("LIVELINE_MAX_MISSED_PONGS", "5"),
            ("LIVELINE_LOG_LEVEL", "debug"),
            ("RUST_LOG", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = LiveConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            env.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.connection.endpoint, "ws://env:9001");
        assert_eq!(config.connection.heartbeat_interval_ms, 20_000);
        assert_eq!(config.connection.max_missed_pongs, 5);
        assert_eq!(config.telemetry.log_level, "trace");
        assert_eq!(
            sources.env_overrides,
            vec![
                "LIVELINE_ENDPOINT",
                "LIVELINE_MAX_MISSED_PONGS",
                "LIVELINE_LOG_LEVEL",
                "RUST_LOG"
            ]
        );
    }
}

//! Configuration loading and CLI definitions.

use std::collections::HashMap;
use std::{fs, path::Path};

use clap::Parser;
use serde::{Deserialize, Serialize};

pub mod defaults {
    //! Default configuration values, shared by serde defaults and tests.

    /// Default listen address (all interfaces, the music-player auth port).
    pub const DEFAULT_LISTEN: &str = "0.0.0.0:8081";
    /// Default bounded worker pool capacity.
    pub const DEFAULT_MAX_WORKERS: usize = 10;
    /// Default TCP listener backlog.
    pub const DEFAULT_CONNECTION_BACKLOG: u32 = 50;
    /// Default users snapshot file.
    pub const DEFAULT_USERS_FILE: &str = "data/users.json";
    /// Default graceful shutdown drain timeout in seconds.
    pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. 0.0.0.0:8081.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Worker pool capacity: connections beyond this queue in the accept
    /// loop instead of spawning unbounded tasks.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// TCP listener backlog (pending connections queue size).
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: default_listen(),
            max_workers: default_max_workers(),
            connection_backlog: default_connection_backlog(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the users snapshot file (parent directory is created at
    /// startup if missing).
    #[serde(default = "default_users_file")]
    pub users_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            users_file: default_users_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"aria_server": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override server listen address, e.g. 0.0.0.0:8081
    #[arg(long)]
    pub listen: Option<String>,
    /// Override worker pool capacity
    #[arg(long)]
    pub max_workers: Option<usize>,
    /// Override TCP listener backlog size
    #[arg(long)]
    pub connection_backlog: Option<u32>,
    /// Override users snapshot file path
    #[arg(long)]
    pub users_file: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config format")]
    UnsupportedFormat,
    #[error("validation: {0}")]
    Validation(String),
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
        "json" => Ok(serde_json::from_str(&data)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&data)?),
        "toml" => Ok(toml::from_str(&data)?),
        _ => Err(ConfigError::UnsupportedFormat),
    }
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    }
    if let Some(v) = overrides.max_workers {
        config.server.max_workers = v;
    }
    if let Some(v) = overrides.connection_backlog {
        config.server.connection_backlog = v;
    }
    if let Some(v) = &overrides.users_file {
        config.store.users_file = v.clone();
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Validation("server.listen is empty".into()));
    }
    if config.server.max_workers == 0 {
        return Err(ConfigError::Validation(
            "server.max_workers must be > 0".into(),
        ));
    }
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if config.store.users_file.trim().is_empty() {
        return Err(ConfigError::Validation("store.users_file is empty".into()));
    }
    Ok(())
}

fn default_listen() -> String {
    defaults::DEFAULT_LISTEN.to_string()
}

fn default_max_workers() -> usize {
    defaults::DEFAULT_MAX_WORKERS
}

fn default_connection_backlog() -> u32 {
    defaults::DEFAULT_CONNECTION_BACKLOG
}

fn default_users_file() -> String {
    defaults::DEFAULT_USERS_FILE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, defaults::DEFAULT_LISTEN);
        assert_eq!(config.server.max_workers, defaults::DEFAULT_MAX_WORKERS);
        assert_eq!(config.store.users_file, defaults::DEFAULT_USERS_FILE);
        validate_config(&config).unwrap();
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
listen = "127.0.0.1:9000"
max_workers = 4

[store]
users_file = "/tmp/users.json"

[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.max_workers, 4);
        assert_eq!(config.store.users_file, "/tmp/users.json");
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = Config::default();
        let overrides = CliOverrides {
            listen: Some("0.0.0.0:1234".into()),
            max_workers: Some(2),
            users_file: Some("u.json".into()),
            log_level: Some("warn".into()),
            ..Default::default()
        };
        apply_overrides(&mut config, &overrides);
        assert_eq!(config.server.listen, "0.0.0.0:1234");
        assert_eq!(config.server.max_workers, 2);
        assert_eq!(config.store.users_file, "u.json");
        assert_eq!(config.logging.level.as_deref(), Some("warn"));
    }

    #[test]
    fn validation_rejects_zero_workers() {
        let mut config = Config::default();
        config.server.max_workers = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validation_rejects_empty_listen() {
        let mut config = Config::default();
        config.server.listen = "  ".into();
        assert!(validate_config(&config).is_err());
    }
}

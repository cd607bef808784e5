//! Configuration for conductd

use conduct_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConductConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Approval policy handed to the engine
    #[serde(default)]
    pub approval: EngineConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, or a full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ConductConfig {
    /// Load configuration: defaults, then the optional file, then `CONDUCT_`
    /// environment variables (`CONDUCT_STORAGE__URL`, `CONDUCT_APPROVAL__LEADER_TIER_REQUIRED`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ConductConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CONDUCT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = ConductConfig::default();
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(!config.approval.leader_tier_required);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ConductConfig::load(None).unwrap();
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn test_file_selects_postgres() {
        let path = write_config(
            "conductd-postgres",
            r#"
[storage]
type = "postgres"
url = "postgres://conduct@localhost/conduct"

[approval]
leader_tier_required = true
"#,
        );

        let config = ConductConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        match config.storage {
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                assert_eq!(url, "postgres://conduct@localhost/conduct");
                assert_eq!(max_connections, 10);
                assert_eq!(connect_timeout_secs, 5);
            }
            other => panic!("expected postgres storage, got {other:?}"),
        }
        assert!(config.approval.leader_tier_required);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ConductConfig::load(Some("/nonexistent/conductd.toml")).is_err());
    }
}

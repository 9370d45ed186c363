//! Redpin Server Bootstrap
//!
//! Loads configuration, installs logging and builds the home factory the
//! rest of the server persists through.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use storage::{HomeFactory, HomeKind, StorageBackend, StorageConfig, StorageError};
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "REDPIN";

/// Bootstrap errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Max level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        self.level
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(self.level.clone()))
    }
}

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Load from an optional TOML file, then apply `REDPIN__*` overrides
    /// (e.g. `REDPIN__STORAGE__BACKEND=memory`)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(config.max_level()?)
        .with_target(true);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if installed.is_err() {
        // Already installed (tests, embedding); keep the existing subscriber
        tracing::debug!("Global tracing subscriber already set");
    }
    Ok(())
}

/// Open storage and build the home factory with every built-in binding
pub async fn bootstrap(config: &StorageConfig) -> Result<HomeFactory, ConfigError> {
    let backend: Arc<dyn StorageBackend> = config.open().await?;
    let factory = HomeFactory::with_default_bindings(backend)?;

    info!("Storage ready: {:?}", factory);
    Ok(factory)
}

/// Record count per registered entity identifier
pub async fn storage_report(factory: &HomeFactory) -> Result<Vec<(String, u64)>, StorageError> {
    let backend = factory.backend();

    let mut report = Vec::new();
    for key in factory.registered()? {
        if key.kind != HomeKind::Entity {
            continue;
        }
        let count = backend.count(key.identifier.as_str()).await?;
        report.push((key.identifier.to_string(), count));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{GsmReading, Measurement};

    #[test]
    fn test_log_level_parsing() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: false,
        };
        assert_eq!(config.max_level().unwrap(), Level::DEBUG);

        let config = LoggingConfig {
            level: "loud".to_string(),
            json: false,
        };
        assert!(matches!(
            config.max_level(),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("redpin-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("server.toml");
        std::fs::write(
            &path,
            "[logging]\nlevel = \"warn\"\n\n[storage]\nbackend = \"memory\"\nmax_connections = 2\n",
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.storage.backend, storage::BackendKind::Memory);
        assert_eq!(config.storage.max_connections, 2);
        assert!(config.storage.create_if_missing);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_and_report() {
        let factory = bootstrap(&StorageConfig::in_memory()).await.unwrap();

        let mut measurement = Measurement::now();
        measurement.add_gsm(GsmReading::new("4711", "1234", -73));
        factory
            .measurement_home()
            .unwrap()
            .add(&mut measurement)
            .await
            .unwrap();

        let report = storage_report(&factory).await.unwrap();
        assert_eq!(report.len(), 7);
        assert!(report.contains(&("org.redpin.core.measure.GSMReading".to_string(), 1)));
        assert!(report.contains(&("org.redpin.core.Measurement".to_string(), 1)));
        assert!(report.contains(&("org.redpin.core.Map".to_string(), 0)));
    }
}

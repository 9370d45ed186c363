//! Storage configuration

use crate::backend::{MemoryBackend, SqliteBackend, StorageBackend};
use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Storage engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,

    /// SQLite connection URL (ignored by the memory backend)
    pub database_url: String,

    /// Pool size for the SQLite backend
    pub max_connections: u32,

    /// Create the database file if it does not exist
    pub create_if_missing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            database_url: "sqlite://redpin.db".to_string(),
            max_connections: 4,
            create_if_missing: true,
        }
    }
}

impl StorageConfig {
    /// Volatile storage, for tests and demos
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    /// SQLite storage at `database_url`
    pub fn sqlite(database_url: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Sqlite,
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    /// Open the configured backend
    pub async fn open(&self) -> Result<Arc<dyn StorageBackend>, StorageError> {
        info!("Opening {:?} storage backend", self.backend);

        let backend: Arc<dyn StorageBackend> = match self.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Sqlite => Arc::new(
                SqliteBackend::connect(
                    &self.database_url,
                    self.max_connections,
                    self.create_if_missing,
                )
                .await?,
            ),
        };

        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.max_connections, 4);
        assert!(config.create_if_missing);
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let backend = StorageConfig::in_memory().open().await.unwrap();
        assert_eq!(backend.name(), "memory");
    }

    #[tokio::test]
    async fn test_open_missing_database_without_create() {
        let config = StorageConfig {
            create_if_missing: false,
            ..StorageConfig::sqlite("sqlite:///nonexistent/redpin/test.db")
        };

        let err = config.open().await.unwrap_err();
        assert!(matches!(err, StorageError::DatabaseError(_)));
    }
}

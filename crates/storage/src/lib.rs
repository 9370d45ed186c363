//! Storage Layer
//!
//! Entity homes persist one entity type each over a pluggable
//! [`StorageBackend`]. Vector homes store readings as members of a
//! measurement vector, and the [`HomeFactory`] hands out exactly one home
//! per registered entity type.

mod backend;
mod bindings;
mod config;
mod entity;
mod factory;
mod home;
mod identifier;
mod measurement;
mod vector;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};
pub use bindings::{BluetoothReadingVectorHome, GsmReadingVectorHome, WifiReadingVectorHome};
pub use config::{BackendKind, StorageConfig};
pub use entity::{Entity, MeasurementRecord};
pub use factory::{FactoryHandle, HomeFactory, HomeKey, HomeKind};
pub use home::EntityHome;
pub use identifier::{
    EntityIdentifier, BLUETOOTH_READING, FINGERPRINT, GSM_READING, LOCATION, MAP, MEASUREMENT,
    WIFI_READING,
};
pub use measurement::MeasurementHome;
pub use vector::VectorHome;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failure (I/O, connectivity, SQL)
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{kind} record {id} not found")]
    NotFound { kind: String, id: i64 },
    /// Update of an entity that was never persisted
    #[error("{kind} entity has not been persisted yet")]
    Unsaved { kind: String },
    /// Missing or conflicting home binding
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: &str, id: i64) -> Self {
        StorageError::NotFound {
            kind: kind.to_string(),
            id,
        }
    }

    /// Whether the requested record simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Whether the error points at a missing or broken home binding
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::ConfigurationError(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

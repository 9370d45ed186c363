//! Entity type identifiers
//!
//! Identifiers are persisted as the discriminator of every record and
//! membership row, so their values must never change once released.

use crate::StorageError;
use std::fmt;

/// Stable name of a logical entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityIdentifier(&'static str);

impl EntityIdentifier {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Reject identifiers that cannot serve as a storage discriminator
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.0.is_empty() {
            return Err(StorageError::ConfigurationError(
                "entity identifier must not be empty".to_string(),
            ));
        }
        if self.0.chars().any(char::is_whitespace) {
            return Err(StorageError::ConfigurationError(format!(
                "entity identifier {:?} contains whitespace",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for EntityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const GSM_READING: EntityIdentifier =
    EntityIdentifier::new("org.redpin.core.measure.GSMReading");
pub const WIFI_READING: EntityIdentifier =
    EntityIdentifier::new("org.redpin.core.measure.WiFiReading");
pub const BLUETOOTH_READING: EntityIdentifier =
    EntityIdentifier::new("org.redpin.core.measure.BluetoothReading");
pub const MEASUREMENT: EntityIdentifier = EntityIdentifier::new("org.redpin.core.Measurement");
pub const MAP: EntityIdentifier = EntityIdentifier::new("org.redpin.core.Map");
pub const LOCATION: EntityIdentifier = EntityIdentifier::new("org.redpin.core.Location");
pub const FINGERPRINT: EntityIdentifier = EntityIdentifier::new("org.redpin.core.Fingerprint");

//! Persistable entities

use crate::identifier::{
    EntityIdentifier, BLUETOOTH_READING, FINGERPRINT, GSM_READING, LOCATION, MAP, MEASUREMENT,
    WIFI_READING,
};
use model::{BluetoothReading, Fingerprint, GsmReading, Location, Map, Measurement, WifiReading};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A domain object stored through an [`EntityHome`](crate::EntityHome).
///
/// The storage id is assigned by the backend on first insert. The
/// identifier is a fixed constant, never derived from the Rust type name.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const IDENTIFIER: EntityIdentifier;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);
}

macro_rules! impl_entity {
    ($ty:ty, $identifier:expr) => {
        impl Entity for $ty {
            const IDENTIFIER: EntityIdentifier = $identifier;

            fn id(&self) -> Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = Some(id);
            }
        }
    };
}

impl_entity!(GsmReading, GSM_READING);
impl_entity!(WifiReading, WIFI_READING);
impl_entity!(BluetoothReading, BLUETOOTH_READING);
impl_entity!(Map, MAP);
impl_entity!(Location, LOCATION);
impl_entity!(Fingerprint, FINGERPRINT);
impl_entity!(MeasurementRecord, MEASUREMENT);

/// Stored header of a [`Measurement`]; its readings live in vector homes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: Option<i64>,
    pub timestamp_ms: i64,
}

impl From<&Measurement> for MeasurementRecord {
    fn from(measurement: &Measurement) -> Self {
        Self {
            id: measurement.id,
            timestamp_ms: measurement.timestamp_ms,
        }
    }
}

//! Vector home bindings, one per reading type.
//!
//! A new reading type needs one binding here and one registration in
//! [`HomeFactory::with_default_bindings`](crate::HomeFactory::with_default_bindings).

use crate::factory::FactoryHandle;
use crate::home::EntityHome;
use crate::identifier::{EntityIdentifier, BLUETOOTH_READING, GSM_READING, WIFI_READING};
use crate::vector::VectorHome;
use model::{BluetoothReading, GsmReading, WifiReading};
use std::sync::Arc;

/// GSM readings as measurement vector members
#[derive(Debug, Clone)]
pub struct GsmReadingVectorHome {
    factory: FactoryHandle,
}

impl GsmReadingVectorHome {
    pub fn new(factory: FactoryHandle) -> Self {
        Self { factory }
    }
}

impl VectorHome<GsmReading> for GsmReadingVectorHome {
    fn contained_object_identifier(&self) -> EntityIdentifier {
        GSM_READING
    }

    fn object_home(&self) -> Option<Arc<EntityHome<GsmReading>>> {
        self.factory.upgrade()?.gsm_reading_home().ok()
    }
}

/// WiFi readings as measurement vector members
#[derive(Debug, Clone)]
pub struct WifiReadingVectorHome {
    factory: FactoryHandle,
}

impl WifiReadingVectorHome {
    pub fn new(factory: FactoryHandle) -> Self {
        Self { factory }
    }
}

impl VectorHome<WifiReading> for WifiReadingVectorHome {
    fn contained_object_identifier(&self) -> EntityIdentifier {
        WIFI_READING
    }

    fn object_home(&self) -> Option<Arc<EntityHome<WifiReading>>> {
        self.factory.upgrade()?.wifi_reading_home().ok()
    }
}

/// Bluetooth readings as measurement vector members
#[derive(Debug, Clone)]
pub struct BluetoothReadingVectorHome {
    factory: FactoryHandle,
}

impl BluetoothReadingVectorHome {
    pub fn new(factory: FactoryHandle) -> Self {
        Self { factory }
    }
}

impl VectorHome<BluetoothReading> for BluetoothReadingVectorHome {
    fn contained_object_identifier(&self) -> EntityIdentifier {
        BLUETOOTH_READING
    }

    fn object_home(&self) -> Option<Arc<EntityHome<BluetoothReading>>> {
        self.factory.upgrade()?.bluetooth_reading_home().ok()
    }
}

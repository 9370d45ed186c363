//! Measurement (fingerprint vector)

use crate::reading::{BluetoothReading, GsmReading, WifiReading};
use serde::{Deserialize, Serialize};

/// All readings taken at one place and time.
///
/// Readings are stored as members of the measurement's vector; a reading's
/// storage record only refers back to the measurement by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Option<i64>,
    /// Capture time (milliseconds since UNIX epoch)
    pub timestamp_ms: i64,
    pub gsm_readings: Vec<GsmReading>,
    pub wifi_readings: Vec<WifiReading>,
    pub bluetooth_readings: Vec<BluetoothReading>,
}

impl Measurement {
    /// Create an empty measurement taken at `timestamp_ms`
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    /// Create an empty measurement stamped with the current time
    pub fn now() -> Self {
        Self::new(chrono::Utc::now().timestamp_millis())
    }

    pub fn add_gsm(&mut self, reading: GsmReading) {
        self.gsm_readings.push(reading);
    }

    pub fn add_wifi(&mut self, reading: WifiReading) {
        self.wifi_readings.push(reading);
    }

    pub fn add_bluetooth(&mut self, reading: BluetoothReading) {
        self.bluetooth_readings.push(reading);
    }

    /// Total number of readings across all sensor types
    pub fn reading_count(&self) -> usize {
        self.gsm_readings.len() + self.wifi_readings.len() + self.bluetooth_readings.len()
    }

    /// Forget all storage ids so the measurement can be persisted as new
    pub fn clear_ids(&mut self) {
        self.id = None;
        self.gsm_readings.iter_mut().for_each(|r| r.id = None);
        self.wifi_readings.iter_mut().for_each(|r| r.id = None);
        self.bluetooth_readings.iter_mut().for_each(|r| r.id = None);
    }
}

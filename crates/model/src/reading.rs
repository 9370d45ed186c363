//! Signal readings reported by client devices

use serde::{Deserialize, Serialize};

/// GSM cell reading
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GsmReading {
    /// Storage id, `None` until persisted
    pub id: Option<i64>,
    pub cell_id: String,
    /// Location area code
    pub area_id: String,
    pub signal_strength: i32,
    /// Mobile country code
    pub mcc: String,
    /// Mobile network code
    pub mnc: String,
    pub network_name: String,
}

impl GsmReading {
    /// Create an unsaved reading for a cell
    pub fn new(
        cell_id: impl Into<String>,
        area_id: impl Into<String>,
        signal_strength: i32,
    ) -> Self {
        Self {
            cell_id: cell_id.into(),
            area_id: area_id.into(),
            signal_strength,
            ..Default::default()
        }
    }

    /// Set the operator codes and name
    pub fn with_network(
        mut self,
        mcc: impl Into<String>,
        mnc: impl Into<String>,
        network_name: impl Into<String>,
    ) -> Self {
        self.mcc = mcc.into();
        self.mnc = mnc.into();
        self.network_name = network_name.into();
        self
    }
}

/// WiFi access point reading
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiReading {
    pub id: Option<i64>,
    pub bssid: String,
    pub ssid: String,
    /// Received signal strength (dBm)
    pub rssi: i32,
    pub wep_enabled: bool,
    /// Infrastructure mode (false for ad-hoc networks)
    pub infrastructure: bool,
}

impl WifiReading {
    pub fn new(bssid: impl Into<String>, ssid: impl Into<String>, rssi: i32) -> Self {
        Self {
            id: None,
            bssid: bssid.into(),
            ssid: ssid.into(),
            rssi,
            wep_enabled: false,
            infrastructure: true,
        }
    }
}

/// Bluetooth device sighting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BluetoothReading {
    pub id: Option<i64>,
    pub bluetooth_address: String,
    pub friendly_name: String,
    pub major_device_class: String,
    pub minor_device_class: String,
}

impl BluetoothReading {
    pub fn new(bluetooth_address: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            bluetooth_address: bluetooth_address.into(),
            friendly_name: friendly_name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsm_with_network() {
        let reading = GsmReading::new("4711", "1234", -73).with_network("228", "01", "Swisscom");
        assert_eq!((reading.mcc.as_str(), reading.mnc.as_str()), ("228", "01"));
        assert_eq!(reading.network_name, "Swisscom");
        assert_eq!(reading.id, None);
    }

    #[test]
    fn test_wifi_defaults_to_infrastructure() {
        let reading = WifiReading::new("00:11:22:33:44:55", "eth", -60);
        assert!(reading.infrastructure);
        assert!(!reading.wep_enabled);
    }
}

//! Redpin Domain Model
//!
//! Readings, measurements and the location types a fingerprint is bound to.

mod location;
mod measurement;
mod reading;

pub use location::{Fingerprint, Location, Map};
pub use measurement::Measurement;
pub use reading::{BluetoothReading, GsmReading, WifiReading};

//! Maps, locations and fingerprints

use serde::{Deserialize, Serialize};

/// Floor plan a location is placed on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Map {
    pub id: Option<i64>,
    pub name: String,
    /// Where clients fetch the map image
    pub url: String,
}

/// Named point on a map
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub id: Option<i64>,
    pub map_id: Option<i64>,
    pub symbolic_id: String,
    /// Pixel coordinates on the map image
    pub map_x: i32,
    pub map_y: i32,
    pub accuracy: i32,
}

/// Association of a measurement with the location it was taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: Option<i64>,
    pub location_id: i64,
    pub measurement_id: i64,
}

impl Fingerprint {
    pub fn new(location_id: i64, measurement_id: i64) -> Self {
        Self {
            id: None,
            location_id,
            measurement_id,
        }
    }
}

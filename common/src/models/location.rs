// common/src/models/location.rs
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

/// Last reported position of a connection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    /// Epoch seconds
    #[serde(rename = "ts")]
    pub timestamp: i64,
    /// Meters, when the client reports it
    pub accuracy: Option<f64>,
}

impl LocationSample {
    pub fn new(lat: f64, lng: f64, timestamp: i64, accuracy: Option<f64>) -> Self {
        Self {
            lat,
            lng,
            timestamp,
            accuracy,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

// common/src/geo.rs
//! Great-circle helpers used for resource lookup and the responder footprint estimate.
use serde::{Deserialize, Serialize};

use crate::models::LocationSample;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average emission of an ambulance or police car, grams CO2 per km
pub const EMERGENCY_VEHICLE_G_PER_KM: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn offset(&self, dlat: f64, dlng: f64) -> Self {
        Self::new(self.lat + dlat, self.lng + dlng)
    }
}

/// Haversine distance in kilometers
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().asin()
}

/// Sum of distances between consecutive samples, in arrival order
pub fn path_length_km(log: &[LocationSample]) -> f64 {
    log.windows(2)
        .map(|pair| haversine_km(pair[0].coordinates(), pair[1].coordinates()))
        .sum()
}

/// Responder footprint for a trail; zero below two samples
pub fn footprint_estimate(log: &[LocationSample]) -> f64 {
    if log.len() < 2 {
        return 0.0;
    }
    path_length_km(log) * EMERGENCY_VEHICLE_G_PER_KM
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// common/src/models/dispatch.rs
use serde::{Deserialize, Serialize};

/// Kind of place offered to a caller during an emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceCategory {
    Police,
    Hospital,
    #[serde(rename = "Safe Zone")]
    SafeZone,
}

/// A nearby place returned by the emergency dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub category: ResourceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl Resource {
    pub fn is_safe_zone(&self) -> bool {
        self.category == ResourceCategory::SafeZone
    }
}

/// Environmental conditions attached to `sos_started`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalData {
    pub air_quality: String,
    /// Celsius
    pub temperature: f64,
    /// Percent
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
}

impl Default for EnvironmentalData {
    fn default() -> Self {
        Self {
            air_quality: "Moderate".to_string(),
            temperature: 28.0,
            humidity: 65.0,
            wind_speed: 12.0,
        }
    }
}

// realtime-server/src/dispatch/resources.rs
use common::geo::{haversine_km, Coordinates};
use common::models::{Resource, ResourceCategory};

/// Radius searched for green-space safe zones
pub const SAFE_ZONE_RADIUS_KM: f64 = 3.0;
pub const MAX_SAFE_ZONES: usize = 3;

/// Emergency services placed at fixed offsets around the caller
const SERVICE_OFFSETS: [(&str, f64, f64, ResourceCategory); 4] = [
    ("Local Police Station", 0.002, -0.002, ResourceCategory::Police),
    ("City Trauma Center", 0.005, 0.005, ResourceCategory::Hospital),
    ("Highway Police Post", -0.003, 0.001, ResourceCategory::Police),
    ("Nearby Govt. Hospital", -0.001, -0.004, ResourceCategory::Hospital),
];

#[derive(Debug, Clone, PartialEq)]
pub struct GreenSpace {
    pub name: String,
    pub position: Coordinates,
}

impl GreenSpace {
    fn new(name: &str, lat: f64, lng: f64) -> Self {
        Self {
            name: name.to_string(),
            position: Coordinates::new(lat, lng),
        }
    }
}

/// Static lookup of help points near a position
#[derive(Debug, Clone)]
pub struct ResourceDirectory {
    green_spaces: Vec<GreenSpace>,
}

impl Default for ResourceDirectory {
    fn default() -> Self {
        Self::bhopal()
    }
}

impl ResourceDirectory {
    pub fn new(green_spaces: Vec<GreenSpace>) -> Self {
        Self { green_spaces }
    }

    /// Parks, lakes, dams and open green areas around Bhopal
    pub fn bhopal() -> Self {
        Self::new(vec![
            GreenSpace::new("Upper Lake (Bada Talab)", 23.2500, 77.4000),
            GreenSpace::new("Van Vihar National Park", 23.2300, 77.4100),
            GreenSpace::new("Lower Lake (Chhota Talab)", 23.2550, 77.4050),
            GreenSpace::new("Shahpura Lake", 23.2400, 77.4200),
            GreenSpace::new("Kerwa Dam", 23.2200, 77.3800),
            GreenSpace::new("Kaliasot Dam", 23.2700, 77.4500),
            GreenSpace::new("Rashtriya Manav Sangrahalaya", 23.2400, 77.4300),
        ])
    }

    /// Green spaces within `radius_km`, nearest first
    pub fn green_spaces_within(&self, origin: Coordinates, radius_km: f64) -> Vec<(&GreenSpace, f64)> {
        let mut nearby: Vec<_> = self
            .green_spaces
            .iter()
            .map(|space| (space, haversine_km(origin, space.position)))
            .filter(|(_, distance)| *distance <= radius_km)
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby
    }

    /// Police, hospitals and up to three safe zones around `origin`
    pub fn nearby(&self, origin: Coordinates) -> Vec<Resource> {
        let services = SERVICE_OFFSETS.iter().map(|(name, dlat, dlng, category)| {
            let at = origin.offset(*dlat, *dlng);
            Resource {
                name: name.to_string(),
                lat: at.lat,
                lng: at.lng,
                category: *category,
                distance_km: None,
            }
        });

        let safe_zones = self
            .green_spaces_within(origin, SAFE_ZONE_RADIUS_KM)
            .into_iter()
            .take(MAX_SAFE_ZONES)
            .map(|(space, distance)| Resource {
                name: format!("{} (Safe Zone)", space.name),
                lat: space.position.lat,
                lng: space.position.lng,
                category: ResourceCategory::SafeZone,
                distance_km: Some(distance),
            });

        services.chain(safe_zones).collect()
    }
}

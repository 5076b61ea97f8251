// realtime-server/src/coordinator/tracker.rs
use std::collections::HashMap;

use common::models::LocationSample;
use uuid::Uuid;

/// Latest position per connection. Samples are overwritten, never appended.
#[derive(Default)]
pub struct LocationTracker {
    samples: HashMap<Uuid, LocationSample>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample, replacing any previous one.
    /// Non-finite coordinates or accuracy are rejected and leave the tracker unchanged.
    pub fn update(&mut self, session_id: Uuid, sample: LocationSample) -> bool {
        let finite = sample.lat.is_finite()
            && sample.lng.is_finite()
            && sample.accuracy.map_or(true, f64::is_finite);
        if !finite {
            return false;
        }

        self.samples.insert(session_id, sample);
        true
    }

    pub fn clear(&mut self, session_id: Uuid) -> Option<LocationSample> {
        self.samples.remove(&session_id)
    }

    pub fn get(&self, session_id: Uuid) -> Option<LocationSample> {
        self.samples.get(&session_id).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

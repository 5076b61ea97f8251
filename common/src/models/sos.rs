// common/src/models/sos.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::LocationSample;
use super::presence::Identity;
use crate::geo::{footprint_estimate, round2, Coordinates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SosStatus {
    Active,
    Resolved,
}

/// One emergency activation and its location trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosRecord {
    pub sos_id: String,
    pub owner_session_id: Uuid,
    pub owner: Identity,
    pub status: SosStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub location_log: Vec<LocationSample>,
}

/// Metrics computed once a session resolves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    /// Grams of CO2 for responders covering the logged trail
    pub footprint_estimate: f64,
    pub duration_minutes: f64,
    pub sample_count: usize,
}

impl SosRecord {
    /// Open an ACTIVE record. The start time is taken from the initial sample when there is one.
    pub fn open(
        sos_id: String,
        owner_session_id: Uuid,
        owner: Identity,
        initial: Option<LocationSample>,
        now: i64,
    ) -> Self {
        Self {
            sos_id,
            owner_session_id,
            owner,
            status: SosStatus::Active,
            start_time: initial.map(|s| s.timestamp).unwrap_or(now),
            end_time: None,
            location_log: initial.into_iter().collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SosStatus::Active
    }

    /// Append to the trail; ignored once resolved
    pub fn append(&mut self, sample: LocationSample) -> bool {
        if !self.is_active() {
            return false;
        }
        self.location_log.push(sample);
        true
    }

    /// Transition to RESOLVED. Returns `None` if the record was already resolved,
    /// leaving `end_time` untouched.
    pub fn resolve(&mut self, now: i64) -> Option<ResolutionSummary> {
        if !self.is_active() {
            return None;
        }
        self.status = SosStatus::Resolved;
        self.end_time = Some(now);
        self.summary()
    }

    pub fn summary(&self) -> Option<ResolutionSummary> {
        let end = self.end_time?;
        Some(ResolutionSummary {
            footprint_estimate: round2(footprint_estimate(&self.location_log)),
            duration_minutes: round2(end.saturating_sub(self.start_time).max(0) as f64 / 60.0),
            sample_count: self.location_log.len(),
        })
    }

    /// Most recent logged position
    pub fn last_position(&self) -> Option<Coordinates> {
        self.location_log.last().map(LocationSample::coordinates)
    }
}

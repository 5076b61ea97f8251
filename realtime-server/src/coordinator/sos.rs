// realtime-server/src/coordinator/sos.rs
use std::collections::HashMap;

use common::models::presence::session_fragment;
use common::models::{Identity, LocationSample, ResolutionSummary, SosRecord};
use uuid::Uuid;

/// Result of a trigger request
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// Snapshot of the freshly opened session
    Opened(SosRecord),
    /// The connection already owns this ACTIVE session; nothing changed
    AlreadyActive(String),
}

/// A session that has just transitioned to RESOLVED
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub sos_id: String,
    pub owner_session_id: Uuid,
    pub summary: ResolutionSummary,
}

/// Owns every SOS record and the connection -> active session mapping
#[derive(Default)]
pub struct SosManager {
    active: HashMap<Uuid, String>,
    records: HashMap<String, SosRecord>,
    // keeps ids unique within one wall-clock second
    seq: u64,
}

impl SosManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session unless the connection already has an ACTIVE one
    pub fn trigger(
        &mut self,
        session_id: Uuid,
        owner: Identity,
        initial: Option<LocationSample>,
        now: i64,
    ) -> TriggerOutcome {
        if let Some(sos_id) = self.active.get(&session_id) {
            return TriggerOutcome::AlreadyActive(sos_id.clone());
        }

        let sos_id = self.next_sos_id(session_id, now);
        let record = SosRecord::open(sos_id.clone(), session_id, owner, initial, now);

        self.records.insert(sos_id.clone(), record.clone());
        self.active.insert(session_id, sos_id);

        TriggerOutcome::Opened(record)
    }

    /// Append to the active trail of a connection. Returns the session id when logged.
    pub fn report_location(&mut self, session_id: Uuid, sample: LocationSample) -> Option<&str> {
        let sos_id = self.active.get(&session_id)?;
        let record = self.records.get_mut(sos_id)?;
        record.append(sample).then_some(sos_id.as_str())
    }

    pub fn active_sos(&self, session_id: Uuid) -> Option<&str> {
        self.active.get(&session_id).map(String::as_str)
    }

    /// Resolve whatever session is active for the connection
    pub fn resolve(&mut self, session_id: Uuid, now: i64) -> Option<Resolution> {
        let sos_id = self.active.get(&session_id)?.clone();
        self.finish(session_id, sos_id, now)
    }

    /// Resolve only if `sos_id` is still the active session of the connection.
    /// A later timer for an already-resolved session is a no-op.
    pub fn resolve_if_current(
        &mut self,
        session_id: Uuid,
        sos_id: &str,
        now: i64,
    ) -> Option<Resolution> {
        if self.active.get(&session_id).map(String::as_str) != Some(sos_id) {
            return None;
        }
        self.finish(session_id, sos_id.to_string(), now)
    }

    fn finish(&mut self, session_id: Uuid, sos_id: String, now: i64) -> Option<Resolution> {
        let record = self.records.get_mut(&sos_id)?;
        let summary = record.resolve(now)?;
        self.active.remove(&session_id);

        Some(Resolution {
            sos_id,
            owner_session_id: record.owner_session_id,
            summary,
        })
    }

    pub fn record(&self, sos_id: &str) -> Option<&SosRecord> {
        self.records.get(sos_id)
    }

    /// Drop resolved records whose end time is older than `retention_secs`
    pub fn evict_resolved(&mut self, now: i64, retention_secs: u64) -> usize {
        let before = self.records.len();
        let retention = i64::try_from(retention_secs).unwrap_or(i64::MAX);

        self.records.retain(|_, record| match record.end_time {
            Some(end) => now.saturating_sub(end) < retention,
            None => true,
        });

        before - self.records.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn next_sos_id(&mut self, session_id: Uuid, now: i64) -> String {
        self.seq += 1;
        format!("sos_{}_{}_{}", now, session_fragment(session_id, 4), self.seq)
    }
}

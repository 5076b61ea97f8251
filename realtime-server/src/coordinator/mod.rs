// realtime-server/src/coordinator/mod.rs
//! Presence, location and SOS state for every live connection.
//!
//! `Coordinator` is plain data with no locking of its own; it is owned by
//! [`CoordinatorActor`](crate::actors::coordinator_actor::CoordinatorActor),
//! whose mailbox serializes every mutation. Each operation appends the
//! notifications it produces to an [`Outbox`] in the order they must be emitted.
pub mod fanout;
pub mod presence;
pub mod sos;
pub mod tracker;

use common::geo::Coordinates;
use common::models::{Identity, LocationSample, SosRecord};
use common::{LocationInput, LocationPayload, ServerEvent, SosResolvedFinal};
use serde::Serialize;
use uuid::Uuid;

pub use fanout::{Channel, Delivery, Outbox};
pub use presence::PresenceRegistry;
pub use sos::{Resolution, SosManager, TriggerOutcome};
pub use tracker::LocationTracker;

/// Counters exposed on the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub online: usize,
    pub tracked_locations: usize,
    pub active_sos: usize,
    pub sos_records: usize,
}

#[derive(Default)]
pub struct Coordinator {
    presence: PresenceRegistry,
    tracker: LocationTracker,
    sos: SosManager,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register identity, subscribe to the shared channel and to any active SOS channel
    pub fn join(&mut self, session_id: Uuid, identity: Identity, out: &mut Outbox) {
        tracing::info!("{} joined as {}", session_id, identity.display_name);
        self.presence.register(session_id, identity);
        out.subscribe(session_id, Channel::Realtime);

        if let Some(sos_id) = self.sos.active_sos(session_id) {
            tracing::info!("{} rejoined active SOS channel {}", session_id, sos_id);
            out.subscribe(session_id, Channel::Sos(sos_id.to_string()));
        }

        out.broadcast_presence(&self.presence, &self.tracker);
    }

    pub fn location_update(
        &mut self,
        session_id: Uuid,
        payload: &LocationPayload,
        now: i64,
        out: &mut Outbox,
    ) {
        match payload.interpret(now) {
            LocationInput::Invalid => {
                tracing::debug!("Dropping malformed location from {}", session_id);
            },
            LocationInput::Cleared => {
                self.tracker.clear(session_id);
                out.broadcast_locations(&self.presence, &self.tracker);
            },
            LocationInput::Sample(sample) => {
                if !self.tracker.update(session_id, sample) {
                    tracing::debug!("Dropping non-finite location from {}", session_id);
                    return;
                }

                if let Some(sos_id) = self.sos.report_location(session_id, sample) {
                    out.broadcast_to_sos(sos_id, ServerEvent::SosLocation(sample), Some(session_id));
                }

                out.broadcast_locations(&self.presence, &self.tracker);
            }
        }
    }

    /// Open an SOS session. Returns the snapshot handed to the emergency dispatch,
    /// or `None` when nothing was opened.
    pub fn trigger(
        &mut self,
        session_id: Uuid,
        fallback: Option<Coordinates>,
        now: i64,
        out: &mut Outbox,
    ) -> Option<SosRecord> {
        let Some(owner) = self.presence.get(session_id).cloned() else {
            tracing::debug!("Ignoring SOS from unidentified session {}", session_id);
            return None;
        };

        let initial = self.tracker.get(session_id).or_else(|| {
            fallback.map(|pos| LocationSample::new(pos.lat, pos.lng, now, None))
        });

        match self.sos.trigger(session_id, owner, initial, now) {
            TriggerOutcome::Opened(record) => {
                tracing::error!(
                    "IMMEDIATE SOS ALERT! ID: {} by {} ({})",
                    record.sos_id,
                    record.owner.display_name,
                    session_id
                );
                out.subscribe(session_id, Channel::Sos(record.sos_id.clone()));
                Some(record)
            }
            TriggerOutcome::AlreadyActive(sos_id) => {
                tracing::warn!("{} already has active SOS {}", session_id, sos_id);
                out.send_to_session(session_id, ServerEvent::error("An SOS is already active."));
                None
            }
        }
    }

    /// Manual resolve; answers the caller with `sos_error` when nothing is active
    pub fn resolve(&mut self, session_id: Uuid, now: i64, out: &mut Outbox) -> bool {
        match self.sos.resolve(session_id, now) {
            Some(resolution) => {
                Self::announce_resolution(resolution, out);
                true
            },
            None => {
                out.send_to_session(session_id, ServerEvent::error("No active SOS found."));
                false
            }
        }
    }

    /// Timer-driven resolve; a no-op unless `sos_id` is still active for the connection
    pub fn auto_resolve(&mut self, session_id: Uuid, sos_id: &str, now: i64, out: &mut Outbox) -> bool {
        match self.sos.resolve_if_current(session_id, sos_id, now) {
            Some(resolution) => {
                tracing::info!("Auto-resolving SOS {}", sos_id);
                Self::announce_resolution(resolution, out);
                true
            },
            None => false,
        }
    }

    fn announce_resolution(resolution: Resolution, out: &mut Outbox) {
        let Resolution {
            sos_id,
            owner_session_id,
            summary,
        } = resolution;

        tracing::warn!("SOS RESOLVE initiated for ID: {}", sos_id);
        out.broadcast_to_sos(
            &sos_id,
            ServerEvent::SosResolved {
                sos_id: sos_id.clone(),
                message: "SOS resolved. Record finalizing.".to_string(),
            },
            None,
        );

        tracing::info!(
            "SOS resolved for {}. Footprint estimate: {:.2}g CO2 over {} samples",
            sos_id,
            summary.footprint_estimate,
            summary.sample_count
        );
        out.send_to_session(
            owner_session_id,
            ServerEvent::SosResolvedFinal(SosResolvedFinal {
                sos_id: sos_id.clone(),
                message: "SOS resolved successfully.".to_string(),
                footprint_estimate: summary.footprint_estimate,
                duration_minutes: summary.duration_minutes,
                sample_count: summary.sample_count,
            }),
        );

        out.close(Channel::Sos(sos_id));
    }

    /// Forget presence and location of a closed connection. Its SOS session, if any,
    /// stays active until resolved by the timer.
    pub fn disconnect(&mut self, session_id: Uuid, out: &mut Outbox) {
        self.presence.unregister(session_id);
        self.tracker.clear(session_id);
        out.broadcast_presence(&self.presence, &self.tracker);
    }

    pub fn sweep(&mut self, now: i64, retention_secs: u64) -> usize {
        self.sos.evict_resolved(now, retention_secs)
    }

    pub fn sos_record(&self, sos_id: &str) -> Option<&SosRecord> {
        self.sos.record(sos_id)
    }

    pub fn active_sos(&self, session_id: Uuid) -> Option<&str> {
        self.sos.active_sos(session_id)
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            online: self.presence.len(),
            tracked_locations: self.tracker.len(),
            active_sos: self.sos.active_count(),
            sos_records: self.sos.record_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::SosStatus;
    use serde_json::json;

    fn location(lat: f64, lng: f64, ts: i64) -> LocationPayload {
        LocationPayload {
            lat: json!(lat),
            lng: json!(lng),
            ts: json!(ts),
            ..Default::default()
        }
    }

    fn joined(coordinator: &mut Coordinator, name: &str) -> Uuid {
        let sid = Uuid::new_v4();
        let identity = Identity::from_parts(sid, None, Some(name.to_string()), None);
        coordinator.join(sid, identity, &mut Outbox::new());
        sid
    }

    fn event_names(out: &Outbox) -> Vec<&'static str> {
        out.deliveries()
            .iter()
            .filter_map(|d| match d {
                Delivery::Broadcast { event, .. } | Delivery::Unicast { event, .. } => Some(event.name()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_join_subscribes_and_broadcasts_presence() {
        let mut coordinator = Coordinator::new();
        let sid = Uuid::new_v4();
        let mut out = Outbox::new();
        coordinator.join(sid, Identity::anonymous(sid), &mut out);

        assert_eq!(
            out.deliveries()[0],
            Delivery::Subscribe {
                session_id: sid,
                channel: Channel::Realtime
            }
        );
        assert_eq!(event_names(&out), vec!["presence"]);
    }

    #[test]
    fn test_invalid_location_is_dropped_silently() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let mut out = Outbox::new();
        let payload = LocationPayload {
            lat: json!("somewhere"),
            lng: json!(77.41),
            ..Default::default()
        };

        coordinator.location_update(sid, &payload, 0, &mut out);
        assert!(out.is_empty());
        assert_eq!(coordinator.status().tracked_locations, 0);
    }

    #[test]
    fn test_cleared_location_rebroadcasts() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        coordinator.location_update(sid, &location(1.0, 1.0, 1), 1, &mut Outbox::new());

        let mut out = Outbox::new();
        coordinator.location_update(sid, &LocationPayload::default(), 2, &mut out);
        assert_eq!(coordinator.status().tracked_locations, 0);
        assert_eq!(
            out.deliveries(),
            &[Delivery::Broadcast {
                channel: Channel::Realtime,
                event: ServerEvent::LocationsUpdate(vec![]),
                skip: None,
            }]
        );
    }

    #[test]
    fn test_locations_skip_unidentified_sessions() {
        let mut coordinator = Coordinator::new();
        let stranger = Uuid::new_v4();
        let mut out = Outbox::new();
        coordinator.location_update(stranger, &location(1.0, 1.0, 1), 1, &mut out);

        assert_eq!(coordinator.status().tracked_locations, 1);
        assert!(matches!(
            &out.deliveries()[0],
            Delivery::Broadcast { event: ServerEvent::LocationsUpdate(entries), .. } if entries.is_empty()
        ));
    }

    #[test]
    fn test_extreme_timestamp_cannot_break_resolution() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let payload = LocationPayload {
            lat: json!(1.0),
            lng: json!(1.0),
            ts: json!(-1e19),
            ..Default::default()
        };

        let mut out = Outbox::new();
        coordinator.location_update(sid, &payload, 100, &mut out);
        assert!(out.is_empty());
        assert_eq!(coordinator.status().tracked_locations, 0);

        let record = coordinator
            .trigger(sid, Some(Coordinates::new(1.0, 1.0)), 100, &mut Outbox::new())
            .expect("session opened");
        assert_eq!(record.start_time, 100);

        assert!(coordinator.resolve(sid, 130, &mut Outbox::new()));
        let stored = coordinator.sos_record(&record.sos_id).expect("record kept");
        assert_eq!(stored.summary().map(|s| s.duration_minutes), Some(0.5));
    }

    #[test]
    fn test_trigger_requires_identity() {
        let mut coordinator = Coordinator::new();
        let mut out = Outbox::new();
        assert!(coordinator.trigger(Uuid::new_v4(), None, 100, &mut out).is_none());
        assert!(out.is_empty());
        assert_eq!(coordinator.status().sos_records, 0);
    }

    #[test]
    fn test_resolve_without_trigger_reports_error_only() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let mut out = Outbox::new();

        assert!(!coordinator.resolve(sid, 100, &mut out));
        assert_eq!(
            out.deliveries(),
            &[Delivery::Unicast {
                session_id: sid,
                event: ServerEvent::error("No active SOS found."),
            }]
        );
        assert_eq!(coordinator.status().sos_records, 0);
    }

    #[test]
    fn test_second_trigger_is_rejected() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let first = coordinator.trigger(sid, None, 100, &mut Outbox::new()).unwrap();

        let mut out = Outbox::new();
        assert!(coordinator.trigger(sid, None, 101, &mut out).is_none());
        assert_eq!(event_names(&out), vec!["sos_error"]);
        assert_eq!(coordinator.active_sos(sid), Some(first.sos_id.as_str()));
        assert_eq!(coordinator.status().sos_records, 1);
    }

    #[test]
    fn test_trigger_uses_alert_position_when_untracked() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let record = coordinator
            .trigger(sid, Some(Coordinates::new(23.0, 77.0)), 500, &mut Outbox::new())
            .unwrap();

        assert_eq!(record.start_time, 500);
        assert_eq!(record.location_log.len(), 1);
        assert_eq!(record.last_position(), Some(Coordinates::new(23.0, 77.0)));
    }

    #[test]
    fn test_full_sos_scenario() {
        let mut coordinator = Coordinator::new();
        let a = joined(&mut coordinator, "Asha");
        let responder = joined(&mut coordinator, "Ravi");

        coordinator.location_update(a, &location(23.25, 77.41, 1000), 1000, &mut Outbox::new());

        let mut out = Outbox::new();
        let record = coordinator.trigger(a, None, 1001, &mut out).unwrap();
        assert_eq!(record.start_time, 1000);
        assert_eq!(record.location_log.len(), 1);
        assert_eq!(
            out.deliveries(),
            &[Delivery::Subscribe {
                session_id: a,
                channel: Channel::Sos(record.sos_id.clone())
            }]
        );

        let mut out = Outbox::new();
        coordinator.location_update(a, &location(23.251, 77.41, 1010), 1010, &mut out);
        assert!(matches!(
            &out.deliveries()[0],
            Delivery::Broadcast { channel: Channel::Sos(id), skip: Some(skip), .. }
                if *id == record.sos_id && *skip == a
        ));
        coordinator.location_update(a, &location(23.252, 77.41, 1020), 1020, &mut Outbox::new());
        assert_eq!(coordinator.sos_record(&record.sos_id).unwrap().location_log.len(), 3);

        // a responder's own movement is not part of the trail
        coordinator.location_update(responder, &location(23.0, 77.0, 1025), 1025, &mut Outbox::new());
        assert_eq!(coordinator.sos_record(&record.sos_id).unwrap().location_log.len(), 3);

        let mut out = Outbox::new();
        assert!(coordinator.resolve(a, 1030, &mut out));
        assert_eq!(event_names(&out), vec!["sos_resolved", "sos_resolved_final"]);

        let Delivery::Unicast { session_id, event: ServerEvent::SosResolvedFinal(done) } = &out.deliveries()[1] else {
            panic!("expected the final report");
        };
        assert_eq!(*session_id, a);
        assert_eq!(done.duration_minutes, 0.5);
        assert_eq!(done.sample_count, 3);
        assert!(done.footprint_estimate > 0.0);
        assert_eq!(
            out.deliveries()[2],
            Delivery::Close {
                channel: Channel::Sos(record.sos_id.clone())
            }
        );

        let stored = coordinator.sos_record(&record.sos_id).unwrap();
        assert_eq!(stored.status, SosStatus::Resolved);
        assert_eq!(stored.end_time, Some(1030));
        assert!(coordinator.active_sos(a).is_none());
    }

    #[test]
    fn test_auto_resolve_after_manual_resolve_is_silent() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let record = coordinator.trigger(sid, None, 100, &mut Outbox::new()).unwrap();
        coordinator.resolve(sid, 110, &mut Outbox::new());

        let mut out = Outbox::new();
        assert!(!coordinator.auto_resolve(sid, &record.sos_id, 130, &mut out));
        assert!(out.is_empty());
        assert_eq!(coordinator.sos_record(&record.sos_id).unwrap().end_time, Some(110));
    }

    #[test]
    fn test_disconnected_owner_is_still_auto_resolved() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Bilal");
        let record = coordinator.trigger(sid, None, 100, &mut Outbox::new()).unwrap();

        let mut out = Outbox::new();
        coordinator.disconnect(sid, &mut out);
        assert_eq!(event_names(&out), vec!["presence"]);
        assert_eq!(coordinator.status().online, 0);

        let mut out = Outbox::new();
        assert!(coordinator.auto_resolve(sid, &record.sos_id, 130, &mut out));
        assert_eq!(event_names(&out), vec!["sos_resolved", "sos_resolved_final"]);
        assert_eq!(coordinator.status().active_sos, 0);
    }

    #[test]
    fn test_rejoin_resubscribes_to_active_sos() {
        let mut coordinator = Coordinator::new();
        let sid = joined(&mut coordinator, "Asha");
        let record = coordinator.trigger(sid, None, 100, &mut Outbox::new()).unwrap();

        let mut out = Outbox::new();
        coordinator.join(sid, Identity::anonymous(sid), &mut out);
        assert!(out.deliveries().contains(&Delivery::Subscribe {
            session_id: sid,
            channel: Channel::Sos(record.sos_id),
        }));
    }
}

// realtime-server/src/coordinator/fanout.rs
use common::{LocationEntry, ServerEvent, REALTIME_CHANNEL};
use uuid::Uuid;

use super::presence::PresenceRegistry;
use super::tracker::LocationTracker;

/// Audience a connection can subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Shared presence/location map
    Realtime,
    /// Dedicated channel of one SOS session
    Sos(String),
}

impl Channel {
    pub fn name(&self) -> &str {
        match self {
            Channel::Realtime => REALTIME_CHANNEL,
            Channel::Sos(sos_id) => sos_id,
        }
    }
}

/// One instruction for the fan-out router
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Subscribe { session_id: Uuid, channel: Channel },
    Close { channel: Channel },
    Broadcast { channel: Channel, event: ServerEvent, skip: Option<Uuid> },
    Unicast { session_id: Uuid, event: ServerEvent },
}

/// Ordered deliveries produced by one coordinator operation
#[derive(Debug, Default)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, session_id: Uuid, channel: Channel) {
        self.deliveries.push(Delivery::Subscribe { session_id, channel });
    }

    pub fn close(&mut self, channel: Channel) {
        self.deliveries.push(Delivery::Close { channel });
    }

    pub fn broadcast_presence(&mut self, registry: &PresenceRegistry, tracker: &LocationTracker) {
        let users = registry.snapshot(tracker);
        self.deliveries.push(Delivery::Broadcast {
            channel: Channel::Realtime,
            event: ServerEvent::Presence { users },
            skip: None,
        });
    }

    /// Positions of every identified connection
    pub fn broadcast_locations(&mut self, registry: &PresenceRegistry, tracker: &LocationTracker) {
        let entries = registry
            .ordered()
            .into_iter()
            .filter_map(|(session_id, identity)| {
                let sample = tracker.get(session_id)?;
                Some(LocationEntry {
                    session_id,
                    name: identity.display_name.clone(),
                    lat: sample.lat,
                    lng: sample.lng,
                    ts: sample.timestamp,
                    accuracy: sample.accuracy,
                })
            })
            .collect();

        self.deliveries.push(Delivery::Broadcast {
            channel: Channel::Realtime,
            event: ServerEvent::LocationsUpdate(entries),
            skip: None,
        });
    }

    pub fn broadcast_to_sos(&mut self, sos_id: &str, event: ServerEvent, skip: Option<Uuid>) {
        self.deliveries.push(Delivery::Broadcast {
            channel: Channel::Sos(sos_id.to_string()),
            event,
            skip,
        });
    }

    pub fn send_to_session(&mut self, session_id: Uuid, event: ServerEvent) {
        self.deliveries.push(Delivery::Unicast { session_id, event });
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn into_deliveries(self) -> Vec<Delivery> {
        self.deliveries
    }
}

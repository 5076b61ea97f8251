// realtime-server/src/coordinator/presence.rs
use std::collections::HashMap;

use common::models::Identity;
use common::PresenceUser;
use uuid::Uuid;

use super::tracker::LocationTracker;

struct PresenceEntry {
    identity: Identity,
    // join order, kept across re-joins
    seq: u64,
}

/// Connections that have announced an identity
#[derive(Default)]
pub struct PresenceRegistry {
    entries: HashMap<Uuid, PresenceEntry>,
    next_seq: u64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert
    pub fn register(&mut self, session_id: Uuid, identity: Identity) {
        if let Some(entry) = self.entries.get_mut(&session_id) {
            entry.identity = identity;
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(session_id, PresenceEntry { identity, seq });
    }

    pub fn unregister(&mut self, session_id: Uuid) -> Option<Identity> {
        self.entries.remove(&session_id).map(|entry| entry.identity)
    }

    pub fn get(&self, session_id: Uuid) -> Option<&Identity> {
        self.entries.get(&session_id).map(|entry| &entry.identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered sessions in join order
    pub fn ordered(&self) -> Vec<(Uuid, &Identity)> {
        let mut sessions: Vec<_> = self
            .entries
            .iter()
            .map(|(id, entry)| (entry.seq, *id, &entry.identity))
            .collect();
        sessions.sort_by_key(|(seq, _, _)| *seq);
        sessions.into_iter().map(|(_, id, identity)| (id, identity)).collect()
    }

    /// Presence list joined with the last known location of each session
    pub fn snapshot(&self, tracker: &LocationTracker) -> Vec<PresenceUser> {
        self.ordered()
            .into_iter()
            .map(|(session_id, identity)| PresenceUser {
                session_id,
                id: identity.id.clone(),
                name: identity.display_name.clone(),
                contact: identity.contact.clone(),
                location: tracker.get(session_id),
            })
            .collect()
    }
}

// realtime-server/src/actors/router_actor.rs
use std::collections::HashSet;

use actix::{Actor, Context, Handler, Message, Recipient};
use dashmap::DashMap;
use uuid::Uuid;

use crate::coordinator::{Channel, Delivery};
use common::ServerEvent;

/// Serialized event pushed to one connection
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct PushEvent {
    pub content: String,
}

/// Message for client registration
#[derive(Message)]
#[rtype(result = "()")]
pub struct RegisterClient {
    pub client_id: Uuid,
    pub recipient: Recipient<PushEvent>,
}

/// Message for client unregistration; also leaves every channel
#[derive(Message)]
#[rtype(result = "()")]
pub struct UnregisterClient {
    pub client_id: Uuid,
}

/// Ordered batch produced by one coordinator operation
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver {
    pub deliveries: Vec<Delivery>,
}

/// Fans events out to connections and tracks channel membership
pub struct RouterActor {
    clients: DashMap<Uuid, Recipient<PushEvent>>,
    channels: DashMap<Channel, HashSet<Uuid>>,
}

impl Default for RouterActor {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterActor {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            channels: DashMap::new(),
        }
    }

    pub fn register_client(&self, client_id: Uuid, recipient: Recipient<PushEvent>) {
        self.clients.insert(client_id, recipient);
    }

    pub fn unregister_client(&self, client_id: &Uuid) {
        self.clients.remove(client_id);
        for mut members in self.channels.iter_mut() {
            members.remove(client_id);
        }
        self.channels.retain(|channel, members| *channel == Channel::Realtime || !members.is_empty());
    }

    fn subscribe(&self, client_id: Uuid, channel: Channel) {
        if !self.clients.contains_key(&client_id) {
            tracing::debug!("Not subscribing unknown client {} to {}", client_id, channel.name());
            return;
        }
        self.channels.entry(channel).or_default().insert(client_id);
    }

    fn broadcast(&self, channel: &Channel, event: &ServerEvent, skip: Option<Uuid>) {
        let Some(members) = self.channels.get(channel) else {
            tracing::debug!("No subscribers on {} for {}", channel.name(), event.name());
            return;
        };

        let content = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize {}: {}", event.name(), e);
                return;
            }
        };

        for client_id in members.iter().filter(|id| Some(**id) != skip) {
            self.push(client_id, content.clone());
        }
    }

    fn unicast(&self, client_id: &Uuid, event: &ServerEvent) {
        match event.to_json() {
            Ok(content) => self.push(client_id, content),
            Err(e) => tracing::error!("Failed to serialize {}: {}", event.name(), e),
        }
    }

    fn push(&self, client_id: &Uuid, content: String) {
        match self.clients.get(client_id) {
            Some(recipient) => recipient.do_send(PushEvent { content }),
            None => tracing::debug!("Client {} not connected, dropping event", client_id),
        }
    }

    fn apply(&self, delivery: Delivery) {
        match delivery {
            Delivery::Subscribe { session_id, channel } => self.subscribe(session_id, channel),
            Delivery::Close { channel } => {
                self.channels.remove(&channel);
            },
            Delivery::Broadcast { channel, event, skip } => self.broadcast(&channel, &event, skip),
            Delivery::Unicast { session_id, event } => self.unicast(&session_id, &event),
        }
    }

    /// Number of connections subscribed to `channel`
    pub fn members(&self, channel: &Channel) -> usize {
        self.channels.get(channel).map(|m| m.len()).unwrap_or(0)
    }
}

impl Actor for RouterActor {
    type Context = Context<Self>;
}

impl Handler<RegisterClient> for RouterActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterClient, _ctx: &mut Self::Context) -> Self::Result {
        self.register_client(msg.client_id, msg.recipient);
    }
}

impl Handler<UnregisterClient> for RouterActor {
    type Result = ();

    fn handle(&mut self, msg: UnregisterClient, _ctx: &mut Self::Context) -> Self::Result {
        self.unregister_client(&msg.client_id);
    }
}

impl Handler<Deliver> for RouterActor {
    type Result = ();

    fn handle(&mut self, msg: Deliver, _ctx: &mut Self::Context) -> Self::Result {
        for delivery in msg.deliveries {
            self.apply(delivery);
        }
    }
}

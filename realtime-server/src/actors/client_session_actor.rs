// realtime-server/src/actors/client_session_actor.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Handler, StreamHandler, WrapFuture};
use actix_web_actors::ws;
use common::geo::Coordinates;
use common::{ClientEvent, ServerEvent, SosAlertPayload};
use uuid::Uuid;

use super::coordinator_actor::{Connect, CoordinatorActor, Disconnect, Join, ResolveSos, TriggerSos, UpdateLocation};
use super::router_actor::PushEvent;
use crate::dispatch::{DispatchReport, EmergencyAlert, EmergencyDispatch};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// One realtime websocket connection
pub struct ClientSessionActor {
    session_id: Uuid,
    last_heartbeat: Instant,
    coordinator: Addr<CoordinatorActor>,
    dispatcher: Arc<dyn EmergencyDispatch>,
    dispatch_timeout: Duration,
}

impl ClientSessionActor {
    pub fn new(
        session_id: Uuid,
        coordinator: Addr<CoordinatorActor>,
        dispatcher: Arc<dyn EmergencyDispatch>,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            last_heartbeat: Instant::now(),
            coordinator,
            dispatcher,
            dispatch_timeout,
        }
    }

    // Ping every few seconds, drop the connection after prolonged silence
    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                tracing::warn!("Client heartbeat timeout: {}", act.session_id);
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    fn handle_event(&mut self, event: ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = self.session_id;
        match event {
            ClientEvent::Join(payload) => {
                self.coordinator.do_send(Join {
                    session_id,
                    identity: payload.into_identity(session_id),
                });
            },
            ClientEvent::LocationUpdate(payload) => {
                self.coordinator.do_send(UpdateLocation { session_id, payload });
            },
            ClientEvent::SosAlert(payload) => self.raise_alert(payload, ctx),
            ClientEvent::SosResolve => {
                self.coordinator.do_send(ResolveSos { session_id });
            },
        }
    }

    /// The connection processes no further frames until the acknowledgment is out.
    fn raise_alert(&mut self, payload: SosAlertPayload, ctx: &mut ws::WebsocketContext<Self>) {
        let fut = open_and_dispatch(
            self.coordinator.clone(),
            self.dispatcher.clone(),
            self.dispatch_timeout,
            self.session_id,
            payload.position(),
        );

        ctx.wait(fut.into_actor(self).map(|started, act, ctx| {
            if let Some(event) = started {
                act.send_event(&event, ctx);
            }
        }));
    }

    fn send_event(&self, event: &ServerEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event.to_json() {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::error!("Failed to serialize {} for {}: {}", event.name(), self.session_id, e),
        }
    }
}

impl Actor for ClientSessionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.last_heartbeat = Instant::now();
        self.heartbeat(ctx);

        self.coordinator.do_send(Connect {
            session_id: self.session_id,
            recipient: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.coordinator.do_send(Disconnect {
            session_id: self.session_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ClientSessionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            },
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            },
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                match ClientEvent::parse(&text) {
                    Ok(event) => self.handle_event(event, ctx),
                    Err(e) => tracing::debug!("Ignoring frame from {}: {}", self.session_id, e),
                }
            },
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("Client closing connection: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            },
            Err(e) => {
                tracing::warn!("Protocol error from {}: {}", self.session_id, e);
                ctx.stop();
            },
            _ => (),
        }
    }
}

impl Handler<PushEvent> for ClientSessionActor {
    type Result = ();

    fn handle(&mut self, msg: PushEvent, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.content);
    }
}

/// Open an SOS session, run the emergency dispatch, then build the `sos_started`
/// acknowledgment carrying its resources. Returns `None` when the coordinator
/// ignored or rejected the trigger. A dispatch slower than `timeout` yields an
/// empty report; the session stays open either way.
pub async fn open_and_dispatch(
    coordinator: Addr<CoordinatorActor>,
    dispatcher: Arc<dyn EmergencyDispatch>,
    timeout: Duration,
    session_id: Uuid,
    fallback: Option<Coordinates>,
) -> Option<ServerEvent> {
    let record = match coordinator.send(TriggerSos { session_id, fallback }).await {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!("Coordinator unavailable for SOS from {}: {}", session_id, e);
            return None;
        }
    };

    let alert = EmergencyAlert::from(&record);
    let report = match tokio::time::timeout(timeout, dispatcher.dispatch(&alert)).await {
        Ok(report) => report,
        Err(_) => {
            tracing::error!("Emergency dispatch for {} timed out after {:?}", alert.sos_id, timeout);
            DispatchReport::default()
        }
    };

    Some(report.into_started_event(record.sos_id))
}

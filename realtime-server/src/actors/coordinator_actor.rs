// realtime-server/src/actors/coordinator_actor.rs
use std::time::Duration;

use actix::{Actor, Addr, AsyncContext, Context, Handler, Message, MessageResult, Recipient};
use common::geo::Coordinates;
use common::models::{Identity, SosRecord};
use common::{now_secs, LocationPayload, SosConfig, SOS_AUTO_RESOLVE_SECS};
use uuid::Uuid;

use super::router_actor::{Deliver, PushEvent, RegisterClient, RouterActor, UnregisterClient};
use crate::coordinator::{Coordinator, CoordinatorStatus, Outbox};

/// A websocket connection came up
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub session_id: Uuid,
    pub recipient: Recipient<PushEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Join {
    pub session_id: Uuid,
    pub identity: Identity,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateLocation {
    pub session_id: Uuid,
    pub payload: LocationPayload,
}

/// Open an SOS session. Answers with the snapshot to dispatch, if one was opened.
#[derive(Message)]
#[rtype(result = "Option<SosRecord>")]
pub struct TriggerSos {
    pub session_id: Uuid,
    pub fallback: Option<Coordinates>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ResolveSos {
    pub session_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub session_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "CoordinatorStatus")]
pub struct GetStatus;

#[derive(Message)]
#[rtype(result = "Option<SosRecord>")]
pub struct GetSosRecord {
    pub sos_id: String,
}

/// Sole owner of presence, location and SOS state
pub struct CoordinatorActor {
    core: Coordinator,
    router: Addr<RouterActor>,
    settings: SosConfig,
    auto_resolve_after: Duration,
}

impl CoordinatorActor {
    pub fn new(router: Addr<RouterActor>, settings: SosConfig) -> Self {
        Self {
            core: Coordinator::new(),
            router,
            settings,
            auto_resolve_after: Duration::from_secs(SOS_AUTO_RESOLVE_SECS),
        }
    }

    fn flush(&self, out: Outbox) {
        if !out.is_empty() {
            self.router.do_send(Deliver {
                deliveries: out.into_deliveries(),
            });
        }
    }

    // Re-checks on wake that `sos_id` is still the connection's active session
    fn schedule_auto_resolve(&self, session_id: Uuid, sos_id: String, ctx: &mut Context<Self>) {
        ctx.run_later(self.auto_resolve_after, move |act, _ctx| {
            let mut out = Outbox::new();
            if act.core.auto_resolve(session_id, &sos_id, now_secs(), &mut out) {
                act.flush(out);
            } else {
                tracing::debug!("Auto-resolve for {} skipped, already resolved", sos_id);
            }
        });
    }

    fn start_sweep_task(&self, ctx: &mut Context<Self>) {
        let interval = Duration::from_secs(self.settings.sweep_interval_secs.max(1));
        ctx.run_interval(interval, |act, _ctx| {
            let evicted = act.core.sweep(now_secs(), act.settings.resolved_retention_secs);
            if evicted > 0 {
                tracing::info!("Evicted {} resolved SOS records", evicted);
            }
        });
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "CoordinatorActor started; resolved SOS records kept for {}s",
            self.settings.resolved_retention_secs
        );
        self.start_sweep_task(ctx);
    }
}

impl Handler<Connect> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Client connected: {}", msg.session_id);
        self.router.do_send(RegisterClient {
            client_id: msg.session_id,
            recipient: msg.recipient,
        });
    }
}

impl Handler<Join> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: Join, _ctx: &mut Self::Context) -> Self::Result {
        let mut out = Outbox::new();
        self.core.join(msg.session_id, msg.identity, &mut out);
        self.flush(out);
    }
}

impl Handler<UpdateLocation> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateLocation, _ctx: &mut Self::Context) -> Self::Result {
        let mut out = Outbox::new();
        self.core.location_update(msg.session_id, &msg.payload, now_secs(), &mut out);
        self.flush(out);
    }
}

impl Handler<TriggerSos> for CoordinatorActor {
    type Result = MessageResult<TriggerSos>;

    fn handle(&mut self, msg: TriggerSos, ctx: &mut Self::Context) -> Self::Result {
        let mut out = Outbox::new();
        let opened = self.core.trigger(msg.session_id, msg.fallback, now_secs(), &mut out);
        self.flush(out);

        if let Some(record) = &opened {
            self.schedule_auto_resolve(msg.session_id, record.sos_id.clone(), ctx);
        }

        MessageResult(opened)
    }
}

impl Handler<ResolveSos> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: ResolveSos, _ctx: &mut Self::Context) -> Self::Result {
        let mut out = Outbox::new();
        self.core.resolve(msg.session_id, now_secs(), &mut out);
        self.flush(out);
    }
}

impl Handler<Disconnect> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Client disconnected: {}", msg.session_id);
        self.router.do_send(UnregisterClient {
            client_id: msg.session_id,
        });

        let mut out = Outbox::new();
        self.core.disconnect(msg.session_id, &mut out);
        self.flush(out);
    }
}

impl Handler<GetStatus> for CoordinatorActor {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, _msg: GetStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.core.status())
    }
}

impl Handler<GetSosRecord> for CoordinatorActor {
    type Result = MessageResult<GetSosRecord>;

    fn handle(&mut self, msg: GetSosRecord, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.core.sos_record(&msg.sos_id).cloned())
    }
}

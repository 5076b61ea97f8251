// realtime-server/tests/sos_flow.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix::{Actor, Addr, Context, Handler};
use async_trait::async_trait;
use common::geo::Coordinates;
use common::models::{Identity, SosStatus};
use common::{LocationPayload, ServerEvent, SosConfig};
use realtime_server::actors::client_session_actor::open_and_dispatch;
use realtime_server::actors::coordinator_actor::{
    Connect, CoordinatorActor, Disconnect, GetSosRecord, GetStatus, Join, ResolveSos, TriggerSos, UpdateLocation,
};
use realtime_server::actors::router_actor::{Deliver, PushEvent, RouterActor};
use realtime_server::dispatch::resources::ResourceDirectory;
use realtime_server::dispatch::{DispatchReport, EmergencyAlert, EmergencyDispatch};
use serde_json::{json, Value};
use uuid::Uuid;

type Inbox = Arc<Mutex<Vec<Value>>>;

/// Stands in for a websocket session and records what it is sent
struct Collector {
    inbox: Inbox,
}

impl Actor for Collector {
    type Context = Context<Self>;
}

impl Handler<PushEvent> for Collector {
    type Result = ();

    fn handle(&mut self, msg: PushEvent, _ctx: &mut Self::Context) -> Self::Result {
        let value = serde_json::from_str(&msg.content).expect("router sends JSON");
        self.inbox.lock().unwrap().push(value);
    }
}

struct Harness {
    router: Addr<RouterActor>,
    coordinator: Addr<CoordinatorActor>,
}

impl Harness {
    fn start() -> Self {
        let router = RouterActor::new().start();
        let coordinator = CoordinatorActor::new(router.clone(), SosConfig::default()).start();
        Self { router, coordinator }
    }

    async fn join(&self, name: &str) -> (Uuid, Inbox) {
        let session_id = Uuid::new_v4();
        let inbox: Inbox = Arc::default();
        let collector = Collector { inbox: inbox.clone() }.start();

        self.coordinator.do_send(Connect {
            session_id,
            recipient: collector.recipient(),
        });
        self.coordinator
            .send(Join {
                session_id,
                identity: Identity::from_parts(session_id, None, Some(name.to_string()), None),
            })
            .await
            .unwrap();

        (session_id, inbox)
    }

    async fn locate(&self, session_id: Uuid, lat: f64, lng: f64, ts: i64) {
        let payload = LocationPayload {
            lat: json!(lat),
            lng: json!(lng),
            ts: json!(ts),
            ..Default::default()
        };
        self.coordinator
            .send(UpdateLocation { session_id, payload })
            .await
            .unwrap();
    }

    /// Wait until the router has applied everything queued so far
    async fn settle(&self) {
        self.router.send(Deliver { deliveries: vec![] }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn count(inbox: &Inbox, event: &str) -> usize {
    inbox
        .lock()
        .unwrap()
        .iter()
        .filter(|v| v["event"] == event)
        .count()
}

fn last(inbox: &Inbox, event: &str) -> Value {
    inbox
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find(|v| v["event"] == event)
        .cloned()
        .unwrap_or(Value::Null)
}

#[actix_rt::test]
async fn test_manual_resolve_reports_trail_to_owner() {
    let harness = Harness::start();
    let (a, inbox_a) = harness.join("Asha").await;
    let (_b, inbox_b) = harness.join("Bilal").await;

    harness.locate(a, 23.25, 77.41, 1000).await;
    let record = harness
        .coordinator
        .send(TriggerSos { session_id: a, fallback: None })
        .await
        .unwrap()
        .expect("session opened");
    assert_eq!(record.start_time, 1000);

    harness.locate(a, 23.251, 77.41, 1010).await;
    harness.locate(a, 23.252, 77.41, 1020).await;
    harness.coordinator.send(ResolveSos { session_id: a }).await.unwrap();
    harness.settle().await;

    assert_eq!(count(&inbox_a, "sos_resolved"), 1);
    let done = last(&inbox_a, "sos_resolved_final");
    assert_eq!(done["data"]["sos_id"], record.sos_id.as_str());
    assert_eq!(done["data"]["sample_count"], 3);

    // other users only see the shared map
    assert_eq!(count(&inbox_b, "sos_resolved_final"), 0);
    assert!(count(&inbox_b, "locations_update") >= 3);

    let stored = harness
        .coordinator
        .send(GetSosRecord { sos_id: record.sos_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SosStatus::Resolved);
}

#[actix_rt::test]
async fn test_resolve_without_sos_answers_caller_only() {
    let harness = Harness::start();
    let (a, inbox_a) = harness.join("Asha").await;
    let (_b, inbox_b) = harness.join("Bilal").await;

    harness.coordinator.send(ResolveSos { session_id: a }).await.unwrap();
    harness.settle().await;

    assert_eq!(last(&inbox_a, "sos_error")["data"]["message"], "No active SOS found.");
    assert_eq!(count(&inbox_b, "sos_error"), 0);
    let status = harness.coordinator.send(GetStatus).await.unwrap();
    assert_eq!(status.sos_records, 0);
}

#[actix_rt::test]
async fn test_auto_resolve_fires_once_after_timeout() {
    tokio::time::pause();
    let harness = Harness::start();
    let (a, inbox_a) = harness.join("Asha").await;
    harness.locate(a, 23.25, 77.41, 1000).await;

    let record = harness
        .coordinator
        .send(TriggerSos { session_id: a, fallback: None })
        .await
        .unwrap()
        .expect("session opened");

    tokio::time::sleep(Duration::from_secs(29)).await;
    harness.settle().await;
    assert_eq!(count(&inbox_a, "sos_resolved_final"), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    harness.settle().await;
    assert_eq!(count(&inbox_a, "sos_resolved"), 1);
    assert_eq!(count(&inbox_a, "sos_resolved_final"), 1);

    let stored = harness
        .coordinator
        .send(GetSosRecord { sos_id: record.sos_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SosStatus::Resolved);
}

#[actix_rt::test]
async fn test_timer_after_manual_resolve_does_not_rebroadcast() {
    tokio::time::pause();
    let harness = Harness::start();
    let (a, inbox_a) = harness.join("Asha").await;

    let record = harness
        .coordinator
        .send(TriggerSos { session_id: a, fallback: None })
        .await
        .unwrap()
        .expect("session opened");
    harness.coordinator.send(ResolveSos { session_id: a }).await.unwrap();
    let end_time = harness
        .coordinator
        .send(GetSosRecord { sos_id: record.sos_id.clone() })
        .await
        .unwrap()
        .unwrap()
        .end_time;

    tokio::time::sleep(Duration::from_secs(35)).await;
    harness.settle().await;

    assert_eq!(count(&inbox_a, "sos_resolved_final"), 1);
    let stored = harness
        .coordinator
        .send(GetSosRecord { sos_id: record.sos_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.end_time, end_time);
}

#[actix_rt::test]
async fn test_disconnected_owner_is_auto_resolved() {
    tokio::time::pause();
    let harness = Harness::start();
    let (b, inbox_b) = harness.join("Bilal").await;

    let record = harness
        .coordinator
        .send(TriggerSos {
            session_id: b,
            fallback: Some(common::geo::Coordinates::new(23.25, 77.41)),
        })
        .await
        .unwrap()
        .expect("session opened");
    harness.coordinator.send(Disconnect { session_id: b }).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    harness.settle().await;

    let stored = harness
        .coordinator
        .send(GetSosRecord { sos_id: record.sos_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SosStatus::Resolved);
    assert_eq!(count(&inbox_b, "sos_resolved_final"), 0);

    let status = harness.coordinator.send(GetStatus).await.unwrap();
    assert_eq!(status.online, 0);
    assert_eq!(status.active_sos, 0);
}

#[actix_rt::test]
async fn test_concurrent_triggers_get_distinct_ids() {
    let harness = Harness::start();
    let mut sessions = Vec::new();
    for i in 0..25 {
        sessions.push(harness.join(&format!("user-{i}")).await.0);
    }

    let pending: Vec<_> = sessions
        .iter()
        .map(|&session_id| harness.coordinator.send(TriggerSos { session_id, fallback: None }))
        .collect();

    let mut ids = HashSet::new();
    for request in pending {
        let record = request.await.unwrap().expect("session opened");
        assert!(ids.insert(record.sos_id));
    }
    assert_eq!(ids.len(), 25);
}

/// Looks up the Bhopal directory and remembers every alert it saw
#[derive(Default)]
struct RecordingDispatch {
    alerts: Mutex<Vec<EmergencyAlert>>,
}

#[async_trait]
impl EmergencyDispatch for RecordingDispatch {
    async fn dispatch(&self, alert: &EmergencyAlert) -> DispatchReport {
        self.alerts.lock().unwrap().push(alert.clone());
        DispatchReport {
            resources: alert
                .position
                .map(|pos| ResourceDirectory::bhopal().nearby(pos))
                .unwrap_or_default(),
            notified: true,
            ..Default::default()
        }
    }
}

struct StalledDispatch;

#[async_trait]
impl EmergencyDispatch for StalledDispatch {
    async fn dispatch(&self, _alert: &EmergencyAlert) -> DispatchReport {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        DispatchReport::default()
    }
}

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

#[actix_rt::test]
async fn test_acknowledgment_carries_dispatch_resources() {
    let harness = Harness::start();
    let (a, _inbox) = harness.join("Asha").await;
    harness.locate(a, 23.25, 77.41, 1000).await;
    let dispatch = Arc::new(RecordingDispatch::default());

    let ack = open_and_dispatch(harness.coordinator.clone(), dispatch.clone(), DISPATCH_TIMEOUT, a, None).await;
    let Some(ServerEvent::SosStarted(started)) = ack else {
        panic!("expected sos_started");
    };

    assert_eq!(started.message, "SOS activated. Help is on the way.");
    assert_eq!(started.resources.len(), 7);
    assert_eq!(started.safe_zones.len(), 3);

    let alerts = dispatch.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].sos_id, started.sos_id);
    assert_eq!(alerts[0].owner.display_name, "Asha");
    assert_eq!(alerts[0].position, Some(Coordinates::new(23.25, 77.41)));
}

#[actix_rt::test]
async fn test_stalled_dispatch_still_acknowledges() {
    tokio::time::pause();
    let harness = Harness::start();
    let (a, _inbox) = harness.join("Asha").await;

    let ack = open_and_dispatch(
        harness.coordinator.clone(),
        Arc::new(StalledDispatch),
        DISPATCH_TIMEOUT,
        a,
        Some(Coordinates::new(23.25, 77.41)),
    )
    .await;
    let Some(ServerEvent::SosStarted(started)) = ack else {
        panic!("expected sos_started");
    };
    assert!(started.resources.is_empty());
    assert!(started.safe_zones.is_empty());

    let stored = harness
        .coordinator
        .send(GetSosRecord { sos_id: started.sos_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SosStatus::Active);
    assert_eq!(stored.location_log.len(), 1);
}

#[actix_rt::test]
async fn test_ignored_trigger_gets_no_acknowledgment() {
    let harness = Harness::start();
    let dispatch = Arc::new(RecordingDispatch::default());

    // never joined
    let stranger = Uuid::new_v4();
    let started = open_and_dispatch(harness.coordinator.clone(), dispatch.clone(), DISPATCH_TIMEOUT, stranger, None).await;
    assert!(started.is_none());
    assert!(dispatch.alerts.lock().unwrap().is_empty());

    let (a, inbox_a) = harness.join("Asha").await;
    let first = open_and_dispatch(harness.coordinator.clone(), dispatch.clone(), DISPATCH_TIMEOUT, a, None).await;
    assert!(matches!(first, Some(ServerEvent::SosStarted(_))));

    let again = open_and_dispatch(harness.coordinator.clone(), dispatch.clone(), DISPATCH_TIMEOUT, a, None).await;
    assert!(again.is_none());
    assert_eq!(dispatch.alerts.lock().unwrap().len(), 1);

    harness.settle().await;
    assert_eq!(last(&inbox_a, "sos_error")["data"]["message"], "An SOS is already active.");
}

// realtime-server/src/routing.rs
use std::sync::Arc;
use std::time::Duration;

use actix::Addr;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use common::Config;
use serde_json::json;
use uuid::Uuid;

use crate::actors::client_session_actor::ClientSessionActor;
use crate::actors::coordinator_actor::{CoordinatorActor, GetStatus};
use crate::dispatch::EmergencyDispatch;

/// Configure routes for the realtime server
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/ws").route(web::get().to(realtime_ws_route)))
        .service(web::resource("/api/status").route(web::get().to(status)));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Raahi Realtime Server")
}

/// WebSocket route for realtime connections; every upgrade gets a fresh session id
async fn realtime_ws_route(
    req: HttpRequest,
    stream: web::Payload,
    coordinator: web::Data<Addr<CoordinatorActor>>,
    dispatcher: web::Data<Arc<dyn EmergencyDispatch>>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let session_id = Uuid::new_v4();
    let session = ClientSessionActor::new(
        session_id,
        coordinator.get_ref().clone(),
        dispatcher.get_ref().clone(),
        Duration::from_secs(config.sos.dispatch_timeout_secs),
    );

    tracing::debug!("Upgrading realtime connection {}", session_id);
    ws::start(session, &req, stream)
}

async fn status(coordinator: web::Data<Addr<CoordinatorActor>>) -> HttpResponse {
    match coordinator.send(GetStatus).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => {
            tracing::error!("Error retrieving coordinator status: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

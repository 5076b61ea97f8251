// realtime-server/src/main.rs
use std::sync::Arc;

use actix::Actor;
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use realtime_server::actors::coordinator_actor::CoordinatorActor;
use realtime_server::actors::router_actor::RouterActor;
use realtime_server::dispatch::{EmergencyDispatch, EmergencyDispatcher};
use realtime_server::routing::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    setup_tracing();

    let config = Config::from_env();
    let server_addr = config.realtime_server_addr.clone();

    let router = RouterActor::new().start();
    let coordinator = CoordinatorActor::new(router, config.sos.clone()).start();

    // Mail transport is chosen once here
    let dispatcher: Arc<dyn EmergencyDispatch> = Arc::new(EmergencyDispatcher::from_config(&config.mail));

    tracing::info!("Starting Realtime Server on {}", server_addr);

    let config_data = web::Data::new(config);
    let coordinator_data = web::Data::new(coordinator);
    let dispatcher_data = web::Data::new(dispatcher);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(coordinator_data.clone())
            .app_data(dispatcher_data.clone())
            .configure(routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}

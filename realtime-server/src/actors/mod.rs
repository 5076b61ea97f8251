// realtime-server/src/actors/mod.rs
pub mod client_session_actor;
pub mod coordinator_actor;
pub mod router_actor;

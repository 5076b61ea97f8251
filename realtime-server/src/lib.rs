//! Realtime presence and SOS coordination.
//!
//! Connections speak JSON frames over `/ws`. A single [`CoordinatorActor`]
//! owns all shared state; [`RouterActor`] fans its notifications out to
//! [`ClientSessionActor`]s, and the emergency dispatch runs once per opened
//! SOS session.
//!
//! [`CoordinatorActor`]: actors::coordinator_actor::CoordinatorActor
//! [`RouterActor`]: actors::router_actor::RouterActor
//! [`ClientSessionActor`]: actors::client_session_actor::ClientSessionActor
pub mod actors;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod routing;

// common/src/models/mod.rs
pub mod dispatch;
pub mod location;
pub mod presence;
pub mod sos;

pub use dispatch::{EnvironmentalData, Resource, ResourceCategory};
pub use location::LocationSample;
pub use presence::Identity;
pub use sos::{ResolutionSummary, SosRecord, SosStatus};

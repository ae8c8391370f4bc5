//! Phase engine, shutdown protocol, and their events.

mod phase;
mod service;

pub use phase::LifecyclePhase;
pub use service::{
    BeforeShutdownEvent, LifecycleService, ShutdownReason, WillShutdownEvent, LIFECYCLE_TOKEN,
};

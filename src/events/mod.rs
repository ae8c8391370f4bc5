//! Broadcast side of the lifecycle engine: event definitions and the bus
//! that carries them to observers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, LifecycleEvent};

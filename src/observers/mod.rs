//! Fan-out consumers of the event bus.

mod observe;
mod set;

pub use observe::Observe;
pub use set::ObserverSet;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;

//! # Observer trait for lifecycle events.
//!
//! [`Observe`] is the extension point for plugging custom consumers
//! (logging, metrics, audit) into the engine's event stream.
//!
//! Each observer gets:
//! - a **dedicated worker task** (runs independently),
//! - a **per-observer bounded queue** (capacity via
//!   [`Observe::queue_capacity`]),
//! - **panic isolation** (panics are caught and reported to the
//!   unexpected-error sink).
//!
//! ## Rules
//! - A slow observer only affects its own queue.
//! - Queue overflow drops the event for this observer only; others are
//!   unaffected.
//! - Events are processed sequentially (FIFO) per observer.
//! - Observers never block the publisher or each other.

use async_trait::async_trait;

use crate::events::LifecycleEvent;

/// Event observer for lifecycle observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not in the publisher context.
    async fn on_event(&self, event: &LifecycleEvent);

    /// Returns the observer name used in overflow/panic diagnostics.
    ///
    /// Prefer short, descriptive names (e.g. "log", "metrics"). The default
    /// uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity for this observer (clamped to at least 1).
    ///
    /// Default: 256.
    fn queue_capacity(&self) -> usize {
        256
    }
}

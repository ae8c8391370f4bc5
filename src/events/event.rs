//! # Runtime events emitted by the lifecycle engine.
//!
//! [`EventKind`] classifies what happened; [`LifecycleEvent`] carries the
//! metadata (timestamp, sequence number, phase, join/listener ids).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use lifewire::{EventKind, LifecycleEvent, LifecyclePhase};
//!
//! let ev = LifecycleEvent::new(EventKind::PhaseChanged).with_phase(LifecyclePhase::Ready);
//!
//! assert_eq!(ev.kind, EventKind::PhaseChanged);
//! assert_eq!(ev.phase, Some(LifecyclePhase::Ready));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::lifecycle::LifecyclePhase;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The engine advanced to a new phase.
    ///
    /// Sets:
    /// - `phase`: the phase just reached
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PhaseChanged,

    /// A normal quit was requested; the veto window is about to open.
    QuitRequested,

    /// A before-shutdown listener vetoed the quit.
    ///
    /// Sets:
    /// - `id`: identifier supplied by the vetoing listener
    ShutdownVetoed,

    /// The will-shutdown sequence started; joins are being collected.
    ///
    /// Sets:
    /// - `reason`: `"quit"` or `"kill"`
    WillShutdown,

    /// A listener registered pending work during the collection window.
    ///
    /// Sets:
    /// - `id`: identifier of the joined work
    JoinRegistered,

    /// Every joined future resolved (or the grace window closed); shutdown
    /// may proceed.
    JoinsSettled,

    /// The grace window elapsed with joins still pending.
    GraceExceeded,

    /// A shutdown listener panicked during dispatch and was skipped.
    ///
    /// Sets:
    /// - `reason`: rendered panic payload
    ListenerPanicked,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct LifecycleEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Phase reached, for [`EventKind::PhaseChanged`].
    pub phase: Option<LifecyclePhase>,
    /// Join or veto identifier, if applicable.
    pub id: Option<Arc<str>>,
    /// Human-readable reason (shutdown reason, panic payloads).
    pub reason: Option<Arc<str>>,
}

impl LifecycleEvent {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            phase: None,
            id: None,
            reason: None,
        }
    }

    /// Attaches the phase this event refers to.
    #[inline]
    pub fn with_phase(mut self, phase: LifecyclePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attaches a join/veto identifier.
    #[inline]
    pub fn with_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = LifecycleEvent::new(EventKind::QuitRequested);
        let b = LifecycleEvent::new(EventKind::JoinsSettled);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_metadata() {
        let ev = LifecycleEvent::new(EventKind::JoinRegistered)
            .with_id("flush-cache")
            .with_reason("quit");
        assert_eq!(ev.id.as_deref(), Some("flush-cache"));
        assert_eq!(ev.reason.as_deref(), Some("quit"));
        assert_eq!(ev.phase, None);
    }
}

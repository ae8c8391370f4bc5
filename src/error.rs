//! Error types used by the wiring container and the lifecycle engine.
//!
//! This module defines three error families:
//!
//! - [`ResolveError`] — construction-time failures raised while resolving
//!   services. These propagate synchronously to the caller of
//!   `create_instance`/`invoke` and are never retried.
//! - [`ShutdownError`] — failures observed while driving the shutdown
//!   sequence. These are recovered per-listener: they are reported to the
//!   unexpected-error sink and never re-thrown into the shutdown path.
//! - [`DisposalError`] — aggregated child-cleanup failures collected by a
//!   [`DisposableStore`](crate::DisposableStore). A failing child never
//!   prevents its siblings from being disposed.
//!
//! The module also hosts the process-wide unexpected-error sink (see
//! [`set_unexpected_error_handler`]). Fatal programming errors — a lifecycle
//! phase regression, registering a disposable on itself — are panics, not
//! variants here.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use thiserror::Error;

/// # Errors raised while resolving or constructing services.
///
/// All variants are fatal configuration or composition defects: the caller
/// of `create_instance`/`invoke` receives them synchronously and no partial
/// instance is constructed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The token was never registered in the service collection.
    #[error("no service registered for token '{token}'")]
    MissingService {
        /// Name of the unresolved token.
        token: Arc<str>,
    },

    /// A descriptor's dependency chain loops back onto a token that is
    /// currently being resolved.
    #[error("cyclic dependency while resolving '{token}': {chain}")]
    CyclicDependency {
        /// The token that closed the cycle.
        token: Arc<str>,
        /// Human-readable resolution chain, e.g. `"a -> b -> a"`.
        chain: String,
    },

    /// The service registered under the token is not of the requested type.
    #[error("service '{token}' is not of the requested type")]
    WrongType {
        /// Name of the token whose instance failed the downcast.
        token: Arc<str>,
    },

    /// A constructor argument slot was missing, already consumed, or held a
    /// value of an unexpected type.
    #[error("constructor argument {index} is missing or of an unexpected type")]
    BadArgument {
        /// Zero-based parameter index of the offending slot.
        index: usize,
    },

    /// The number of explicit leading arguments does not match the number of
    /// non-injected constructor slots.
    #[error("expected {expected} leading argument(s), got {got}")]
    ArityMismatch {
        /// Free (non-injected) slots the constructor exposes.
        expected: usize,
        /// Leading arguments actually supplied.
        got: usize,
    },
}

impl ResolveError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResolveError::MissingService { .. } => "resolve_missing_service",
            ResolveError::CyclicDependency { .. } => "resolve_cyclic_dependency",
            ResolveError::WrongType { .. } => "resolve_wrong_type",
            ResolveError::BadArgument { .. } => "resolve_bad_argument",
            ResolveError::ArityMismatch { .. } => "resolve_arity_mismatch",
        }
    }
}

/// # Errors observed while driving the shutdown sequence.
///
/// None of these abort shutdown. Each is reported through
/// [`report_unexpected_error`] at the point it is observed, and the
/// remaining listeners and the join-await still run to completion.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// A shutdown listener panicked during dispatch. The panic was caught,
    /// the listener skipped, and the rest of the sequence continued.
    #[error("listener on '{emitter}' panicked: {detail}")]
    ListenerPanicked {
        /// Name of the emitter that dispatched the listener.
        emitter: &'static str,
        /// Panic payload rendered as text.
        detail: String,
    },

    /// `join` was called after the collection window closed. The work is
    /// not awaited; registering joins outside the synchronous
    /// `on_will_shutdown` dispatch is a misuse.
    #[error("join '{id}' registered after the shutdown collection window closed")]
    LateJoin {
        /// Identifier the caller supplied for the joined work.
        id: Arc<str>,
    },

    /// The configured grace window elapsed before every joined future
    /// resolved; shutdown proceeded anyway.
    #[error("shutdown grace {grace:?} exceeded; pending joins: {pending:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Identifiers of joins that had not resolved when the window closed.
        pending: Vec<String>,
    },
}

impl ShutdownError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::ListenerPanicked { .. } => "shutdown_listener_panicked",
            ShutdownError::LateJoin { .. } => "shutdown_late_join",
            ShutdownError::GraceExceeded { .. } => "shutdown_grace_exceeded",
        }
    }
}

/// # Failures observed while fanning events out to observers.
///
/// All recovered: the event is dropped for the one affected observer,
/// the failure is reported through [`report_unexpected_error`], and the
/// remaining observers are unaffected.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ObserverError {
    /// The observer's bounded queue was full; the event was dropped for it.
    #[error("observer '{observer}' dropped event seq {seq}: queue full")]
    QueueFull {
        /// Name of the observer whose queue overflowed.
        observer: &'static str,
        /// Sequence number of the dropped event.
        seq: u64,
    },

    /// The observer's worker has exited; the event was dropped for it.
    #[error("observer '{observer}' dropped event seq {seq}: worker closed")]
    WorkerClosed {
        /// Name of the observer whose worker is gone.
        observer: &'static str,
        /// Sequence number of the dropped event.
        seq: u64,
    },

    /// The observer panicked inside `on_event`. The panic was caught and
    /// the worker kept running.
    #[error("observer '{observer}' panicked: {detail}")]
    Panicked {
        /// Name of the panicking observer.
        observer: &'static str,
        /// Panic payload rendered as text.
        detail: String,
    },
}

impl ObserverError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ObserverError::QueueFull { .. } => "observer_queue_full",
            ObserverError::WorkerClosed { .. } => "observer_worker_closed",
            ObserverError::Panicked { .. } => "observer_panicked",
        }
    }
}

/// Aggregated failures from disposing the children of a
/// [`DisposableStore`](crate::DisposableStore).
///
/// Disposal continues past a failing child, so one error here never implies
/// the remaining children were skipped.
#[derive(Debug)]
pub struct DisposalError {
    /// One rendered message per failed child, in disposal order.
    pub failures: Vec<String>,
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} child disposal(s) failed: {}",
            self.failures.len(),
            self.failures.join("; ")
        )
    }
}

impl Error for DisposalError {}

type ErrorHandlerFn = dyn Fn(&(dyn Error + 'static)) + Send + Sync;

/// Process-wide sink for recovered errors. Defaults to stderr.
static ERROR_HANDLER: Lazy<RwLock<Arc<ErrorHandlerFn>>> = Lazy::new(|| {
    RwLock::new(Arc::new(|e: &(dyn Error + 'static)| {
        eprintln!("[lifewire] unexpected error: {e}");
    }))
});

/// Replaces the process-wide unexpected-error handler.
///
/// The handler receives errors that were recovered rather than propagated:
/// shutdown listener panics, late joins, grace overruns, and aggregated
/// disposal failures. It must not panic.
pub fn set_unexpected_error_handler(
    handler: impl Fn(&(dyn Error + 'static)) + Send + Sync + 'static,
) {
    let mut slot = ERROR_HANDLER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = Arc::new(handler);
}

/// Reports a recovered error to the current unexpected-error handler.
pub fn report_unexpected_error(err: &(dyn Error + 'static)) {
    let handler = {
        let slot = ERROR_HANDLER.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&slot)
    };
    handler(err);
}

/// Renders a caught panic payload as text for reporting.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_labels() {
        let missing = ResolveError::MissingService {
            token: "product".into(),
        };
        assert_eq!(missing.as_label(), "resolve_missing_service");

        let arity = ResolveError::ArityMismatch {
            expected: 2,
            got: 0,
        };
        assert_eq!(arity.as_label(), "resolve_arity_mismatch");
        assert_eq!(arity.to_string(), "expected 2 leading argument(s), got 0");
    }

    #[test]
    fn test_observer_error_labels() {
        let full = ObserverError::QueueFull {
            observer: "metrics",
            seq: 7,
        };
        assert_eq!(full.as_label(), "observer_queue_full");
        assert_eq!(
            full.to_string(),
            "observer 'metrics' dropped event seq 7: queue full"
        );
    }

    #[test]
    fn test_disposal_error_aggregates_messages() {
        let err = DisposalError {
            failures: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "2 child disposal(s) failed: a; b");
    }

    #[test]
    fn test_panic_message_renders_common_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("kaput")), "kaput");
        assert_eq!(panic_message(&42_u32), "non-string panic payload");
    }
}

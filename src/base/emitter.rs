//! # Synchronous multi-listener event dispatch.
//!
//! [`Emitter`] is the single-producer, multi-consumer primitive behind the
//! lifecycle engine's shutdown events. Dispatch is **synchronous**: every
//! listener runs inside `emit()` before it returns, which is what allows the
//! engine to collect shutdown joins during the dispatch window.
//!
//! ## Rules
//! - Listeners run in subscription order.
//! - A panicking listener is caught, reported as
//!   [`ShutdownError::ListenerPanicked`], and the remaining listeners still
//!   run.
//! - `subscribe()` returns a [`Disposable`] that unregisters the listener;
//!   disposing the emitter drops all listeners at once.
//!
//! For fire-and-forget broadcasting across tasks use
//! [`Bus`](crate::events::Bus) instead.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::base::disposal::{to_disposable, Disposable};
use crate::error::{panic_message, report_unexpected_error, ShutdownError};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ListenerMap<T> = Arc<Mutex<BTreeMap<u64, Listener<T>>>>;

/// An event with one payload that can be subscribed to.
///
/// The `BTreeMap` keyed by a monotonically increasing id keeps dispatch in
/// subscription order.
pub struct Emitter<T> {
    name: &'static str,
    listeners: ListenerMap<T>,
    next_id: AtomicU64,
}

impl<T: 'static> Emitter<T> {
    /// Creates an emitter. `name` identifies it in panic reports.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Name used in listener-panic reports.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers a listener; the returned handle unregisters it.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Arc<dyn Disposable> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Arc::new(listener));

        let listeners = Arc::clone(&self.listeners);
        to_disposable(move || {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        })
    }

    /// Dispatches `event` to every listener in subscription order.
    ///
    /// Panics are isolated per listener and reported to the
    /// unexpected-error sink. Returns the number of listeners that
    /// panicked.
    pub fn emit(&self, event: &T) -> usize {
        // Snapshot so a listener may subscribe/unsubscribe during dispatch
        // without deadlocking on the map.
        let snapshot: Vec<Listener<T>> = self.lock().values().cloned().collect();

        let mut panicked = 0;
        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                panicked += 1;
                report_unexpected_error(&ShutdownError::ListenerPanicked {
                    emitter: self.name,
                    detail: panic_message(payload.as_ref()),
                });
            }
        }
        panicked
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Listener<T>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> Disposable for Emitter<T>
where
    T: Send + Sync,
{
    fn dispose(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let emitter = Emitter::<u32>::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            emitter.subscribe(move |v: &u32| {
                log.lock().unwrap().push((tag, *v));
            });
        }

        emitter.emit(&7);

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen, vec![("first", 7), ("second", 7), ("third", 7)]);
    }

    #[test]
    fn test_disposing_subscription_unregisters() {
        let emitter = Emitter::<()>::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let sub = emitter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(&());
        sub.dispose();
        emitter.emit(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let emitter = Emitter::<()>::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        emitter.subscribe(|_| panic!("listener blew up"));
        let c = Arc::clone(&calls);
        emitter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let panicked = emitter.emit(&());

        assert_eq!(panicked, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_drops_all_listeners() {
        let emitter = Emitter::<()>::new("test");
        emitter.subscribe(|_| {});
        emitter.subscribe(|_| {});
        emitter.dispose();
        assert_eq!(emitter.listener_count(), 0);
        assert_eq!(emitter.emit(&()), 0);
    }
}

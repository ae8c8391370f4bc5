//! # Fan-out of lifecycle events to observers.
//!
//! [`ObserverSet`] gives every observer its own bounded queue and worker
//! task, so publishing never waits on observer code and one slow or broken
//! observer cannot hold up the rest.
//!
//! ## Rules
//! - `emit` never blocks: a full or closed queue drops the event *for that
//!   observer only*, and the drop is reported as an [`ObserverError`]
//!   through the unexpected-error sink with the observer's name and the
//!   event's `seq`.
//! - Each observer sees its events in queue (FIFO) order; there is no
//!   ordering guarantee across observers.
//! - A panic inside `on_event` is caught, reported as
//!   [`ObserverError::Panicked`], and the worker keeps draining its queue.
//!
//! ## Diagram
//! ```text
//!    emit(&LifecycleEvent)
//!        │                        (Arc-clone per observer)
//!        ├────────────────► [queue O1] ─► worker O1 ─► on_event()
//!        ├────────────────► [queue O2] ─► worker O2 ─► on_event()
//!        └────────────────► [queue ON] ─► worker ON ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::{panic_message, report_unexpected_error, ObserverError};
use crate::events::LifecycleEvent;

use super::Observe;

/// One observer's queue handle plus its worker.
struct Slot {
    name: &'static str,
    queue: mpsc::Sender<Arc<LifecycleEvent>>,
    worker: JoinHandle<()>,
}

/// Composite fan-out with per-observer bounded queues and worker tasks.
///
/// Must be constructed inside a tokio runtime (workers are spawned on
/// creation).
pub struct ObserverSet {
    slots: Vec<Slot>,
}

impl ObserverSet {
    /// Creates a new set and spawns one worker per observer.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>) -> Self {
        Self {
            slots: observers.into_iter().map(spawn_slot).collect(),
        }
    }

    /// Fans one event out to all observers without blocking.
    ///
    /// A queue that cannot take the event drops it for its observer and
    /// reports the drop; delivery to the other observers is unaffected.
    pub fn emit(&self, event: &LifecycleEvent) {
        let shared = Arc::new(event.clone());
        for slot in &self.slots {
            let failure = match slot.queue.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(dropped)) => ObserverError::QueueFull {
                    observer: slot.name,
                    seq: dropped.seq,
                },
                Err(mpsc::error::TrySendError::Closed(dropped)) => ObserverError::WorkerClosed {
                    observer: slot.name,
                    seq: dropped.seq,
                },
            };
            report_unexpected_error(&failure);
        }
    }

    /// Graceful shutdown: close all queues, then await each worker draining
    /// the events it already accepted.
    pub async fn shutdown(self) {
        let mut workers = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            drop(slot.queue);
            workers.push(slot.worker);
        }
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Spawns the dedicated worker for one observer and returns its slot.
fn spawn_slot(observer: Arc<dyn Observe>) -> Slot {
    let name = observer.name();
    let capacity = observer.queue_capacity().max(1);
    let (queue, mut incoming) = mpsc::channel::<Arc<LifecycleEvent>>(capacity);

    let worker = tokio::spawn(async move {
        while let Some(event) = incoming.recv().await {
            let handled = std::panic::AssertUnwindSafe(observer.on_event(event.as_ref()))
                .catch_unwind()
                .await;
            if let Err(payload) = handled {
                report_unexpected_error(&ObserverError::Panicked {
                    observer: observer.name(),
                    detail: panic_message(payload.as_ref()),
                });
            }
        }
    });

    Slot {
        name,
        queue,
        worker,
    }
}

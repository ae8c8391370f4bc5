//! # One-shot async gate.
//!
//! A [`Barrier`] starts closed and becomes open permanently after the first
//! call to [`Barrier::open`]. Any number of waiters may block on a closed
//! barrier; all of them — and every future waiter — resolve once it opens.
//!
//! Backed by [`tokio_util::sync::CancellationToken`], which is exactly a
//! latched broadcast signal. There is no cancellation primitive for a
//! barrier itself: a caller wanting a timeout races `wait()` against its own
//! timer.

use tokio_util::sync::CancellationToken;

/// A gate that is initially closed and then becomes opened permanently.
#[derive(Clone, Debug)]
pub struct Barrier {
    gate: CancellationToken,
}

impl Barrier {
    /// Creates a closed barrier.
    pub fn new() -> Self {
        Self {
            gate: CancellationToken::new(),
        }
    }

    /// True once the barrier has been opened.
    pub fn is_open(&self) -> bool {
        self.gate.is_cancelled()
    }

    /// Opens the barrier, releasing all current and future waiters.
    ///
    /// The transition is one-way; further calls are no-ops.
    pub fn open(&self) {
        self.gate.cancel();
    }

    /// Pends until the barrier is open; resolves immediately afterwards.
    pub async fn wait(&self) {
        self.gate.cancelled().await;
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

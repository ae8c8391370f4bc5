//! # Ownership and deterministic teardown of resources.
//!
//! Every resource in the crate implements [`Disposable`]; parents collect
//! their children in a [`DisposableStore`] so that disposing the parent
//! disposes the entire owned subtree exactly once.
//!
//! ## Rules
//! - `dispose()` is idempotent: a second call is a no-op.
//! - A store marks itself disposed **before** recursing, then disposes every
//!   registered child. A panicking child is caught, the remaining children
//!   are still disposed, and the failures are aggregated into a
//!   [`DisposalError`] handed to the unexpected-error sink.
//! - Registering a store on itself panics (cycle of length 1). Longer
//!   ownership cycles are not detected; construction order is expected to be
//!   acyclic.
//! - Adding a child to an already disposed store disposes the child
//!   immediately instead of leaking it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use lifewire::{to_disposable, Disposable, DisposableStore};
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let store = DisposableStore::new();
//!
//! let c = Arc::clone(&calls);
//! store.add(to_disposable(move || {
//!     c.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! store.dispose();
//! store.dispose(); // idempotent
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{panic_message, report_unexpected_error, DisposalError};

/// An object that performs a cleanup operation when `dispose()` is called.
///
/// Examples: an event listener that removes itself, a service releasing a
/// resource, the return value of a registration.
///
/// Implementations must be idempotent: disposing twice is a no-op.
pub trait Disposable: Send + Sync {
    /// Releases whatever this object holds. Must tolerate repeated calls.
    fn dispose(&self);
}

struct StoreState {
    children: Vec<Arc<dyn Disposable>>,
    disposed: bool,
}

/// A set of disposables owned by a parent.
///
/// Disposing the store disposes every registered child in registration
/// order. The store itself is a [`Disposable`], so stores nest into trees.
pub struct DisposableStore {
    state: Mutex<StoreState>,
}

impl DisposableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                children: Vec::new(),
                disposed: false,
            }),
        }
    }

    /// True once `dispose()` has run.
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Number of currently registered children.
    pub fn len(&self) -> usize {
        self.lock().children.len()
    }

    /// True if no children are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().children.is_empty()
    }

    /// Registers `child` and returns it, allowing inline chaining.
    ///
    /// # Panics
    /// Panics if `child` is this very store: a node may not own itself.
    ///
    /// If the store is already disposed the child is disposed immediately
    /// rather than silently leaked.
    pub fn add(&self, child: Arc<dyn Disposable>) -> Arc<dyn Disposable> {
        let child_data = Arc::as_ptr(&child) as *const ();
        let self_data = self as *const Self as *const ();
        if std::ptr::eq(child_data, self_data) {
            panic!("cannot register a disposable store on itself");
        }

        let mut state = self.lock();
        if state.disposed {
            drop(state);
            dispose_child(&child, &mut Vec::new());
            return child;
        }
        state.children.push(Arc::clone(&child));
        child
    }

    /// Disposes and drops all registered children without marking this
    /// store as disposed.
    pub fn clear(&self) {
        let children = {
            let mut state = self.lock();
            std::mem::take(&mut state.children)
        };
        dispose_all(children);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DisposableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for DisposableStore {
    fn dispose(&self) {
        let children = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            // Marked before recursing so re-entrant disposal is a no-op.
            state.disposed = true;
            std::mem::take(&mut state.children)
        };
        dispose_all(children);
    }
}

/// Disposes every child, aggregating failures, and reports them to the
/// unexpected-error sink. One failing child never blocks its siblings.
fn dispose_all(children: Vec<Arc<dyn Disposable>>) {
    let mut failures = Vec::new();
    for child in &children {
        dispose_child(child, &mut failures);
    }
    if !failures.is_empty() {
        report_unexpected_error(&DisposalError { failures });
    }
}

fn dispose_child(child: &Arc<dyn Disposable>, failures: &mut Vec<String>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| child.dispose())) {
        failures.push(panic_message(payload.as_ref()));
    }
}

struct CallbackDisposable {
    cleanup: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Disposable for CallbackDisposable {
    fn dispose(&self) {
        let cleanup = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(f) = cleanup {
            f();
        }
    }
}

/// Wraps a bare cleanup closure as a [`Disposable`].
///
/// The closure runs at most once, even if `dispose()` is invoked multiple
/// times; the one-time guard is independent of any store the result is
/// registered into.
pub fn to_disposable(cleanup: impl FnOnce() + Send + 'static) -> Arc<dyn Disposable> {
    Arc::new(CallbackDisposable {
        cleanup: Mutex::new(Some(Box::new(cleanup))),
    })
}

//! # The phase engine and shutdown coordinator.
//!
//! [`LifecycleService`] owns the host's position in the startup sequence and
//! runs the two-step shutdown protocol:
//!
//! ```text
//!   quit()
//!     ├─► before-shutdown dispatch ──► veto? ──► stop, return true
//!     └─► will-shutdown dispatch
//!            │  (synchronous window: listeners call join(id, future))
//!            ├─► await all joined work, bounded by Config::grace
//!            └─► JoinsSettled, return false
//!
//!   kill(code)  — same join sequence, no veto step, then process exit
//! ```
//!
//! ## Rules
//! - Phases only move forward; `set_phase` with a lower phase panics.
//! - A skipped phase still releases its waiters: advancing opens the barrier
//!   of every phase now reached.
//! - The will-shutdown sequence fires at most once per service; a second
//!   `quit`/`kill` skips straight past it.
//! - `join` outside the dispatch window is misuse: the work is dropped and
//!   reported, never awaited.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::base::{Barrier, Disposable, Emitter};
use crate::config::Config;
use crate::error::{panic_message, report_unexpected_error, ResolveError, ShutdownError};
use crate::events::{Bus, EventKind, LifecycleEvent};
use crate::observers::ObserverSet;
use crate::services::{Component, CtorArgs};

use super::phase::LifecyclePhase;

/// Token under which hosts conventionally register the lifecycle service.
pub const LIFECYCLE_TOKEN: &str = "lifecycle";

type JoinFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Why the shutdown sequence is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Normal quit; the veto window was offered first.
    Quit,
    /// Forceful termination; no veto window.
    Kill,
}

impl ShutdownReason {
    /// Stable lowercase label (log fields, event metadata).
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownReason::Quit => "quit",
            ShutdownReason::Kill => "kill",
        }
    }
}

/// Dispatched before a normal quit; any listener may veto it.
///
/// The first veto wins; later vetoes keep the original identifier.
pub struct BeforeShutdownEvent {
    reason: ShutdownReason,
    veto: Mutex<Option<Arc<str>>>,
}

impl BeforeShutdownEvent {
    fn new(reason: ShutdownReason) -> Self {
        Self {
            reason,
            veto: Mutex::new(None),
        }
    }

    /// Why shutdown was requested.
    pub fn reason(&self) -> ShutdownReason {
        self.reason
    }

    /// Blocks the quit. `id` names the vetoing party for diagnostics.
    pub fn veto(&self, id: impl Into<Arc<str>>) {
        let mut veto = self.veto.lock().unwrap_or_else(PoisonError::into_inner);
        if veto.is_none() {
            *veto = Some(id.into());
        }
    }

    /// Identifier of the winning veto, if any.
    pub fn vetoed(&self) -> Option<Arc<str>> {
        self.veto
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct JoinCollector {
    open: bool,
    joins: Vec<(Arc<str>, JoinFuture)>,
}

/// Dispatched when shutdown is final; listeners register pending work.
///
/// `join` only collects during the synchronous dispatch — the engine closes
/// the window as soon as every listener has returned, then awaits the
/// aggregate. The event is cheap to clone; a clone held past the window can
/// no longer join.
#[derive(Clone)]
pub struct WillShutdownEvent {
    reason: ShutdownReason,
    collector: Arc<Mutex<JoinCollector>>,
}

impl WillShutdownEvent {
    fn new(reason: ShutdownReason) -> Self {
        Self {
            reason,
            collector: Arc::new(Mutex::new(JoinCollector {
                open: true,
                joins: Vec::new(),
            })),
        }
    }

    /// Why shutdown is happening.
    pub fn reason(&self) -> ShutdownReason {
        self.reason
    }

    /// Registers work shutdown must wait for. May be called any number of
    /// times per listener.
    ///
    /// After the collection window closed the future is dropped unawaited
    /// and the misuse is reported as [`ShutdownError::LateJoin`].
    pub fn join(&self, id: impl Into<Arc<str>>, work: impl Future<Output = ()> + Send + 'static) {
        let id = id.into();
        let mut collector = self
            .collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !collector.open {
            drop(collector);
            report_unexpected_error(&ShutdownError::LateJoin { id });
            return;
        }
        collector.joins.push((id, Box::pin(work)));
    }

    fn close(&self) -> Vec<(Arc<str>, JoinFuture)> {
        let mut collector = self
            .collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collector.open = false;
        std::mem::take(&mut collector.joins)
    }
}

struct PhaseState {
    current: LifecyclePhase,
    /// Barrier per not-yet-reached phase, created on first `when`.
    waiters: HashMap<LifecyclePhase, Barrier>,
}

/// Phase engine, shutdown coordinator, and event source.
///
/// A [`Component`] (constructible through the instantiation service with a
/// [`Config`] as its single leading argument) and a [`Disposable`] (disposal
/// drops all listeners and releases all phase waiters).
pub struct LifecycleService {
    config: Config,
    bus: Bus,
    state: Mutex<PhaseState>,
    before_shutdown: Emitter<BeforeShutdownEvent>,
    will_shutdown: Emitter<WillShutdownEvent>,
    quit_requested: AtomicBool,
    restarted: AtomicBool,
    shutdown_fired: AtomicBool,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

impl LifecycleService {
    /// Creates the engine in [`LifecyclePhase::Starting`].
    pub fn new(config: Config) -> Self {
        let bus = Bus::new(config.bus_capacity_clamped());
        Self {
            config,
            bus,
            state: Mutex::new(PhaseState {
                current: LifecyclePhase::Starting,
                waiters: HashMap::new(),
            }),
            before_shutdown: Emitter::new("before_shutdown"),
            will_shutdown: Emitter::new("will_shutdown"),
            quit_requested: AtomicBool::new(false),
            restarted: AtomicBool::new(false),
            shutdown_fired: AtomicBool::new(false),
            forwarders: Mutex::new(Vec::new()),
        }
    }

    /// The event bus this engine publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.lock_state().current
    }

    /// Advances to `phase`.
    ///
    /// Same phase is a no-op. A lower phase panics (programming error).
    /// Advancing opens and removes the barrier of every phase now reached,
    /// so waiters on a skipped phase release too. Publishes
    /// [`EventKind::PhaseChanged`].
    pub fn set_phase(&self, phase: LifecyclePhase) {
        {
            let mut state = self.lock_state();
            if phase == state.current {
                return;
            }
            if phase < state.current {
                panic!(
                    "lifecycle cannot go backwards: {} -> {}",
                    state.current, phase
                );
            }
            state.current = phase;
            let reached: Vec<LifecyclePhase> = state
                .waiters
                .keys()
                .copied()
                .filter(|p| *p <= phase)
                .collect();
            for p in reached {
                if let Some(barrier) = state.waiters.remove(&p) {
                    barrier.open();
                }
            }
        }
        self.bus
            .publish(LifecycleEvent::new(EventKind::PhaseChanged).with_phase(phase));
    }

    /// Resolves once `phase` has been reached.
    ///
    /// Immediate if the engine is already at or past `phase`; otherwise
    /// waits on the phase's barrier.
    pub async fn when(&self, phase: LifecyclePhase) {
        let barrier = {
            let mut state = self.lock_state();
            if phase <= state.current {
                return;
            }
            state
                .waiters
                .entry(phase)
                .or_insert_with(Barrier::new)
                .clone()
        };
        barrier.wait().await;
    }

    /// Registers a veto-window listener. The handle unregisters it.
    pub fn on_before_shutdown(
        &self,
        listener: impl Fn(&BeforeShutdownEvent) + Send + Sync + 'static,
    ) -> Arc<dyn Disposable> {
        self.before_shutdown.subscribe(listener)
    }

    /// Registers a will-shutdown listener. The handle unregisters it.
    pub fn on_will_shutdown(
        &self,
        listener: impl Fn(&WillShutdownEvent) + Send + Sync + 'static,
    ) -> Arc<dyn Disposable> {
        self.will_shutdown.subscribe(listener)
    }

    /// Requests a normal quit.
    ///
    /// Dispatches the veto window first: if any listener vetoes, shutdown
    /// stops and this returns `true`. Otherwise the will-shutdown sequence
    /// runs to completion and this returns `false`.
    pub async fn quit(&self) -> bool {
        self.quit_requested.store(true, Ordering::SeqCst);
        self.bus.publish(LifecycleEvent::new(EventKind::QuitRequested));

        let event = BeforeShutdownEvent::new(ShutdownReason::Quit);
        self.before_shutdown.emit(&event);
        if let Some(id) = event.vetoed() {
            self.bus
                .publish(LifecycleEvent::new(EventKind::ShutdownVetoed).with_id(id));
            self.quit_requested.store(false, Ordering::SeqCst);
            return true;
        }

        self.fire_will_shutdown(ShutdownReason::Quit).await;
        false
    }

    /// Forceful termination: no veto window, the join sequence still runs,
    /// then the process exits with `code`.
    pub async fn kill(&self, code: i32) -> ! {
        self.run_kill_sequence().await;
        std::process::exit(code)
    }

    /// Everything `kill` does short of exiting the process. The veto
    /// window is never dispatched on this path.
    pub(crate) async fn run_kill_sequence(&self) {
        self.fire_will_shutdown(ShutdownReason::Kill).await;
    }

    /// Runs the will-shutdown sequence: synchronous listener dispatch with
    /// the join window open, then awaits all joined work bounded by the
    /// configured grace window. At most once per service; later calls
    /// return immediately.
    pub async fn fire_will_shutdown(&self, reason: ShutdownReason) {
        if self.shutdown_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bus.publish(
            LifecycleEvent::new(EventKind::WillShutdown).with_reason(reason.as_label()),
        );

        let event = WillShutdownEvent::new(reason);
        self.will_shutdown.emit(&event);
        let joins = event.close();

        let pending: Arc<Mutex<BTreeSet<Arc<str>>>> = Arc::new(Mutex::new(
            joins.iter().map(|(id, _)| Arc::clone(id)).collect(),
        ));
        let mut wrapped: Vec<JoinFuture> = Vec::with_capacity(joins.len());
        for (id, work) in joins {
            self.bus.publish(
                LifecycleEvent::new(EventKind::JoinRegistered).with_id(Arc::clone(&id)),
            );
            let pending = Arc::clone(&pending);
            wrapped.push(Box::pin(async move {
                if let Err(payload) = AssertUnwindSafe(work).catch_unwind().await {
                    report_unexpected_error(&ShutdownError::ListenerPanicked {
                        emitter: "will_shutdown",
                        detail: panic_message(payload.as_ref()),
                    });
                }
                pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
            }));
        }

        let aggregate = futures::future::join_all(wrapped);
        match self.config.grace_limit() {
            None => {
                aggregate.await;
            }
            Some(grace) => {
                if tokio::time::timeout(grace, aggregate).await.is_err() {
                    let left: Vec<String> = pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .iter()
                        .map(|id| id.to_string())
                        .collect();
                    self.bus
                        .publish(LifecycleEvent::new(EventKind::GraceExceeded));
                    report_unexpected_error(&ShutdownError::GraceExceeded {
                        grace,
                        pending: left,
                    });
                }
            }
        }

        self.bus.publish(LifecycleEvent::new(EventKind::JoinsSettled));
    }

    /// True between a quit request and its veto (or forever after an
    /// unvetoed quit).
    pub fn quit_requested(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }

    /// True once the will-shutdown sequence has started.
    pub fn shutdown_fired(&self) -> bool {
        self.shutdown_fired.load(Ordering::SeqCst)
    }

    /// Marks this process as a relaunch of a previous one.
    pub fn mark_restarted(&self) {
        self.restarted.store(true, Ordering::SeqCst);
    }

    /// True if [`LifecycleService::mark_restarted`] was called.
    pub fn was_restarted(&self) -> bool {
        self.restarted.load(Ordering::SeqCst)
    }

    /// Bridges the bus into a fan-out set: every event published from now
    /// on reaches each observer. The forwarding task ends (and shuts the
    /// set down) when this service is disposed or dropped.
    ///
    /// Must be called inside a tokio runtime.
    pub fn attach_observers(&self, observers: ObserverSet) {
        let mut rx = self.bus.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => observers.emit(&event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            observers.shutdown().await;
        });
        self.lock_forwarders().push(handle);
    }

    fn lock_state(&self) -> MutexGuard<'_, PhaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_forwarders(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Component for LifecycleService {
    fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
        let config = args.take::<Config>(0)?;
        Ok(Self::new(config))
    }
}

impl Disposable for LifecycleService {
    fn dispose(&self) {
        for handle in self.lock_forwarders().drain(..) {
            handle.abort();
        }
        // Release anyone parked on a future phase.
        let mut state = self.lock_state();
        for (_, barrier) in state.waiters.drain() {
            barrier.open();
        }
        drop(state);
        self.before_shutdown.dispose();
        self.will_shutdown.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_when_is_immediate_for_reached_phase() {
        let service = LifecycleService::new(Config::default());
        service.when(LifecyclePhase::Starting).await;
        service.set_phase(LifecyclePhase::Ready);
        service.when(LifecyclePhase::Ready).await;
        assert_eq!(service.phase(), LifecyclePhase::Ready);
    }

    #[tokio::test]
    async fn test_set_phase_releases_waiters() {
        let service = Arc::new(LifecycleService::new(Config::default()));

        let s = Arc::clone(&service);
        let waiter = tokio::spawn(async move {
            s.when(LifecyclePhase::Ready).await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        service.set_phase(LifecyclePhase::Ready);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .expect("waiter did not panic");
    }

    #[tokio::test]
    async fn test_skipped_phase_still_releases_waiters() {
        let service = Arc::new(LifecycleService::new(Config::default()));

        let s = Arc::clone(&service);
        let waiter = tokio::spawn(async move {
            s.when(LifecyclePhase::Ready).await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        service.set_phase(LifecyclePhase::AfterWindowOpen);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter on skipped phase released")
            .expect("waiter did not panic");
    }

    #[test]
    #[should_panic(expected = "lifecycle cannot go backwards")]
    fn test_phase_regression_panics() {
        let service = LifecycleService::new(Config::default());
        service.set_phase(LifecyclePhase::AfterWindowOpen);
        service.set_phase(LifecyclePhase::Ready);
    }

    #[test]
    fn test_same_phase_is_a_noop() {
        let service = LifecycleService::new(Config::default());
        service.set_phase(LifecyclePhase::Ready);
        service.set_phase(LifecyclePhase::Ready);
        assert_eq!(service.phase(), LifecyclePhase::Ready);
    }

    #[tokio::test]
    async fn test_veto_stops_shutdown() {
        let service = LifecycleService::new(Config::default());

        let _veto = service.on_before_shutdown(|ev| ev.veto("unsaved-work"));
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let _will = service.on_will_shutdown(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        assert!(service.quit().await);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!service.quit_requested());
        assert!(!service.shutdown_fired());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_joined_work() {
        let service = LifecycleService::new(Config::default());

        let done = Arc::new(AtomicBool::new(false));
        let d = Arc::clone(&done);
        let _sub = service.on_will_shutdown(move |ev| {
            let d = Arc::clone(&d);
            ev.join("flush-cache", async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                d.store(true, Ordering::SeqCst);
            });
        });

        assert!(!service.quit().await);
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_late_join_is_dropped_unawaited() {
        let service = LifecycleService::new(Config::default());

        let stash: Arc<Mutex<Option<WillShutdownEvent>>> = Arc::new(Mutex::new(None));
        let s = Arc::clone(&stash);
        let _sub = service.on_will_shutdown(move |ev| {
            *s.lock().unwrap() = Some(ev.clone());
        });

        service.quit().await;

        let event = stash.lock().unwrap().take().expect("listener ran");
        let ran = Arc::new(AtomicBool::new(false));
        let r = Arc::clone(&ran);
        event.join("too-late", async move {
            r.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_will_shutdown_fires_at_most_once() {
        let service = LifecycleService::new(Config::default());

        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let _sub = service.on_will_shutdown(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        service.fire_will_shutdown(ShutdownReason::Quit).await;
        service.fire_will_shutdown(ShutdownReason::Quit).await;
        assert!(!service.quit().await);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_kill_sequence_skips_the_veto_window() {
        let service = LifecycleService::new(Config::default());

        let vetoes = Arc::new(AtomicUsize::new(0));
        let v = Arc::clone(&vetoes);
        let _veto = service.on_before_shutdown(move |ev| {
            v.fetch_add(1, Ordering::SeqCst);
            ev.veto("never-consulted");
        });

        let reason_seen: Arc<Mutex<Option<ShutdownReason>>> = Arc::new(Mutex::new(None));
        let r = Arc::clone(&reason_seen);
        let _will = service.on_will_shutdown(move |ev| {
            *r.lock().unwrap() = Some(ev.reason());
        });

        service.run_kill_sequence().await;

        assert_eq!(vetoes.load(Ordering::SeqCst), 0);
        assert_eq!(*reason_seen.lock().unwrap(), Some(ShutdownReason::Kill));
        assert!(service.shutdown_fired());
    }

    #[tokio::test]
    async fn test_grace_window_bounds_shutdown() {
        let config = Config::default().with_grace(Some(Duration::from_millis(20)));
        let service = LifecycleService::new(config);

        let _sub = service.on_will_shutdown(|ev| {
            ev.join("stuck", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        });

        let started = Instant::now();
        service.quit().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_panicking_join_does_not_stall_others() {
        let service = LifecycleService::new(Config::default());

        let done = Arc::new(AtomicBool::new(false));
        let d = Arc::clone(&done);
        let _sub = service.on_will_shutdown(move |ev| {
            ev.join("boom", async {
                panic!("join blew up");
            });
            let d = Arc::clone(&d);
            ev.join("steady", async move {
                d.store(true, Ordering::SeqCst);
            });
        });

        service.quit().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dispose_releases_phase_waiters() {
        let service = Arc::new(LifecycleService::new(Config::default()));

        let s = Arc::clone(&service);
        let waiter = tokio::spawn(async move {
            s.when(LifecyclePhase::Eventually).await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        service.dispose();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released by dispose")
            .expect("waiter did not panic");
    }

    #[test]
    fn test_restart_flag() {
        let service = LifecycleService::new(Config::default());
        assert!(!service.was_restarted());
        service.mark_restarted();
        assert!(service.was_restarted());
    }
}

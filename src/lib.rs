//! # lifewire
//!
//! **Lifewire** is a service-wiring and lifecycle-coordination library for
//! Rust.
//!
//! It provides the plumbing a long-lived host process needs before it does
//! anything useful: a token-based service container with lazy, memoized
//! construction; a phase engine that lets components await startup
//! milestones; a two-step shutdown protocol (vetoable quit, then a
//! join-and-wait sequence); and a disposal tree for deterministic cleanup.
//! The crate is designed as a building block for application shells and
//! daemons.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!    │  Component   │   │  Component   │   │  Component   │
//!    │ (wiring #1)  │   │ (wiring #2)  │   │ (wiring #3)  │
//!    └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!           ▼                  ▼                  ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  InstantiationService (the resolver)                         │
//! │  - ServiceCollection (token → instance | descriptor)         │
//! │  - dependency side table (per-component injection slots)     │
//! │  - resolving stack (cycle detection)                         │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  LifecycleService (phase engine + shutdown coordinator)      │
//! │  - phase barriers: when(phase) parks until reached           │
//! │  - before-shutdown: veto window for a normal quit            │
//! │  - will-shutdown: join(id, future) collection, grace-bounded │
//! └──────┬───────────────────────────────────────────────┬───────┘
//!        │ publishes                                     │ owns
//!        ▼                                               ▼
//! ┌─────────────────────────┐                 ┌────────────────────┐
//! │  Bus (broadcast)        │                 │  DisposableStore   │
//! │  PhaseChanged, Will-    │                 │  (cleanup tree,    │
//! │  Shutdown, JoinsSettled │                 │   depth-first)     │
//! └──────────┬──────────────┘                 └────────────────────┘
//!            ▼
//!      ObserverSet (per-observer queues + workers)
//! ```
//!
//! ### Shutdown
//! ```text
//! quit()
//!   ├─► publish QuitRequested
//!   ├─► dispatch before-shutdown listeners (synchronous)
//!   │       └─ veto("id")? ─► publish ShutdownVetoed, return true
//!   └─► fire_will_shutdown(Quit)
//!          ├─► dispatch will-shutdown listeners (synchronous)
//!          │       └─ each may join("id", future) — any number of times
//!          ├─► close the join window (late joins dropped + reported)
//!          ├─► await all joins, bounded by Config::grace
//!          │       └─ window exceeded ─► publish GraceExceeded, proceed
//!          └─► publish JoinsSettled, return false
//!
//! kill(code): same join sequence, no veto window, then process exit.
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                            |
//! |-----------------|---------------------------------------------------------|-----------------------------------------------|
//! | **Wiring**      | Declare injection slots, register services by token.    | [`Component`], [`Wiring`], [`ServiceId`]      |
//! | **Resolution**  | Lazy, memoized, cycle-checked construction.             | [`InstantiationService`], [`ServiceDescriptor`] |
//! | **Phases**      | Await startup milestones; strictly forward progression. | [`LifecycleService`], [`LifecyclePhase`]      |
//! | **Shutdown**    | Vetoable quit, join-and-wait, forceful kill.            | [`BeforeShutdownEvent`], [`WillShutdownEvent`] |
//! | **Cleanup**     | Deterministic depth-first disposal.                     | [`Disposable`], [`DisposableStore`]           |
//! | **Events**      | Broadcast bus with fan-out observers.                   | [`Bus`], [`Observe`], [`ObserverSet`]         |
//! | **Errors**      | Typed errors for resolution, shutdown, and disposal.    | [`ResolveError`], [`ShutdownError`]           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lifewire::{
//!     service_id, Component, Config, CtorArg, CtorArgs, InstantiationService,
//!     LifecyclePhase, LifecycleService, ResolveError, ServiceCollection,
//!     ServiceDescriptor, Wiring,
//! };
//!
//! struct WindowManager {
//!     lifecycle: Arc<LifecycleService>,
//! }
//!
//! impl Component for WindowManager {
//!     fn wiring() -> Wiring {
//!         Wiring::new().depends_on(&service_id("lifecycle"), 0)
//!     }
//!
//!     fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
//!         Ok(Self {
//!             lifecycle: args.service::<LifecycleService>(0)?,
//!         })
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut services = ServiceCollection::new();
//!     services.set_descriptor(
//!         service_id("lifecycle"),
//!         ServiceDescriptor::new::<LifecycleService>(vec![
//!             Box::new(Config::default()) as CtorArg,
//!         ]),
//!     );
//!
//!     let instantiation = InstantiationService::new(services);
//!     let windows = instantiation.create_instance::<WindowManager>(Vec::new())?;
//!
//!     windows.lifecycle.set_phase(LifecyclePhase::Ready);
//!     windows.lifecycle.when(LifecyclePhase::Ready).await;
//!
//!     let vetoed = windows.lifecycle.quit().await;
//!     assert!(!vetoed);
//!     Ok(())
//! }
//! ```
mod base;
mod config;
mod error;
mod events;
mod lifecycle;
mod observers;
mod services;

// ---- Public re-exports ----

pub use base::{to_disposable, Barrier, Disposable, DisposableStore, Emitter};
pub use config::Config;
pub use error::{
    report_unexpected_error, set_unexpected_error_handler, DisposalError, ObserverError,
    ResolveError, ShutdownError,
};
pub use events::{Bus, EventKind, LifecycleEvent};
pub use lifecycle::{
    BeforeShutdownEvent, LifecyclePhase, LifecycleService, ShutdownReason, WillShutdownEvent,
    LIFECYCLE_TOKEN,
};
pub use observers::{Observe, ObserverSet};
pub use services::{
    dependencies_of, record_dependency, service_id, Component, CtorArg, CtorArgs,
    DependencyRecord, InstantiationService, ServiceCollection, ServiceDescriptor, ServiceEntry,
    ServiceId, ServiceObject, ServicesAccessor, Wiring, INSTANTIATION_TOKEN,
};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;

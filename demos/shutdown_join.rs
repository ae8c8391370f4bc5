//! # Example: shutdown_join
//!
//! Shows the two-step shutdown protocol with the built-in [`LogWriter`]
//! observer attached to the event bus.
//!
//! The example:
//! - Attaches a `LogWriter` so every lifecycle event is printed.
//! - Registers a before-shutdown listener that vetoes the first quit.
//! - Registers a will-shutdown listener that joins 150ms of flush work.
//!
//! ## Flow
//! ```text
//! quit() #1 ─► QuitRequested ─► veto("unsaved-draft") ─► ShutdownVetoed
//! quit() #2 ─► QuitRequested ─► WillShutdown
//!                 ├─► join("flush-drafts", sleep 150ms)
//!                 ├─► JoinRegistered
//!                 └─► await joins ─► JoinsSettled
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example shutdown_join --features logging
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lifewire::{Config, LifecycleService, LogWriter, Observe, ObserverSet};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let lifecycle = Arc::new(LifecycleService::new(Config::default()));

    // Print every bus event through the reference observer.
    let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter::default())];
    lifecycle.attach_observers(ObserverSet::new(observers));

    // Veto the first quit, allow the second.
    let vetoed_once = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&vetoed_once);
    let _veto = lifecycle.on_before_shutdown(move |ev| {
        if !flag.swap(true, Ordering::SeqCst) {
            println!("[app] refusing to quit: unsaved draft");
            ev.veto("unsaved-draft");
        }
    });

    // Flush pending work before the process goes away.
    let _flush = lifecycle.on_will_shutdown(|ev| {
        ev.join("flush-drafts", async {
            println!("[app] flushing drafts...");
            tokio::time::sleep(Duration::from_millis(150)).await;
            println!("[app] drafts flushed");
        });
    });

    println!("[host] first quit attempt");
    assert!(lifecycle.quit().await, "expected the quit to be vetoed");

    println!("[host] second quit attempt");
    assert!(!lifecycle.quit().await, "expected the quit to proceed");

    // Give the observer worker a moment to drain its queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

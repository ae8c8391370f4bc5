use async_trait::async_trait;

use crate::events::{EventKind, LifecycleEvent};

use super::Observe;

/// Base observer that logs events to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
#[derive(Default)]
pub struct LogWriter;

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, e: &LifecycleEvent) {
        match e.kind {
            EventKind::PhaseChanged => {
                if let Some(phase) = e.phase {
                    println!("[phase] now={phase}");
                }
            }
            EventKind::QuitRequested => {
                println!("[quit-requested]");
            }
            EventKind::ShutdownVetoed => {
                println!("[shutdown-vetoed] by={:?}", e.id);
            }
            EventKind::WillShutdown => {
                println!("[will-shutdown] reason={:?}", e.reason);
            }
            EventKind::JoinRegistered => {
                println!("[join] id={:?}", e.id);
            }
            EventKind::JoinsSettled => {
                println!("[joins-settled]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
            EventKind::ListenerPanicked => {
                println!("[listener-panicked] detail={:?}", e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

//! # Startup phases.
//!
//! A host advances through the phases strictly forward; each phase implies
//! every earlier one. Skipping a phase is legal (a host may jump from
//! `Starting` straight to `AfterWindowOpen`), going backwards is not.

use std::fmt;

/// Ordered startup phases of a hosting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// First services are wired; nothing user-visible exists yet.
    Starting = 1,
    /// Core services are resolved and the host can serve requests.
    Ready = 2,
    /// The first surface (window, endpoint) is open to the outside.
    AfterWindowOpen = 3,
    /// Background/idle work may begin; everything urgent is done.
    Eventually = 4,
}

impl LifecyclePhase {
    /// Stable lowercase label (log fields, event metadata).
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecyclePhase::Starting => "starting",
            LifecyclePhase::Ready => "ready",
            LifecyclePhase::AfterWindowOpen => "after_window_open",
            LifecyclePhase::Eventually => "eventually",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

//! Control signals for the monitoring loop
//!
//! Signals flow one way: the interactive channel produces them, the
//! controller consumes them. They are transient and never stored.

/// A request from the interactive channel to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop after the current step, without starting another cycle
    RequestExit,
    /// Cut the current sleep short and refresh now
    RequestInterruptSleep,
    /// Stop rendering until output is resumed
    RequestSuppressOutput,
    /// Allow rendering again
    RequestResumeOutput,
    /// Change what the view shows; passed through to the renderer
    View(ViewCommand),
}

/// A change to what the renderer displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    /// Show only threads whose name contains this (None clears the filter)
    SetFilter(Option<String>),
    /// Show at most this many threads (None shows all)
    SetLimit(Option<usize>),
    /// Move to the next sort column
    CycleSort,
    /// Change seconds between refreshes
    SetInterval(u64),
}

/// Why a sleep ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Refresh now, then keep running
    Refresh,
    /// Termination was requested
    Exit,
}

impl WakeReason {
    /// Combine two pending reasons; exit always wins
    pub fn merge(self, other: WakeReason) -> WakeReason {
        if self == WakeReason::Exit || other == WakeReason::Exit {
            WakeReason::Exit
        } else {
            WakeReason::Refresh
        }
    }
}

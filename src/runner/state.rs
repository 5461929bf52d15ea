//! Loop state owned by the controller

/// Lifecycle of the monitoring loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Configured, not yet rendering
    #[default]
    Init,
    /// Cycling through render and sleep
    Running,
    /// Writing the final line
    Exiting,
    /// Loop has ended
    Terminated,
}

/// Mutable state of one run; never shared outside the controller
#[derive(Debug, Default)]
pub struct LoopState {
    /// Completed sleeps, starting at 0
    pub iteration_count: u64,
    /// Frames rendered so far
    pub renders: u64,
    pub phase: Phase,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next phase
    pub fn transition(&mut self, next: Phase) {
        log::debug!("Loop phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_new() {
        let state = LoopState::new();
        assert_eq!(state.iteration_count, 0);
        assert_eq!(state.renders, 0);
        assert_eq!(state.phase, Phase::Init);
        assert!(!state.is_terminated());
    }

    #[test]
    fn test_transition() {
        let mut state = LoopState::new();
        state.transition(Phase::Running);
        state.transition(Phase::Exiting);
        state.transition(Phase::Terminated);
        assert!(state.is_terminated());
    }
}

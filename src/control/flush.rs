//! FlushGate - holds rendering while someone else owns the terminal

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often a held gate is re-checked
pub const HOLD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Suppression flag polled by the controller before each render
#[derive(Debug)]
pub struct FlushGate {
    held: AtomicBool,
    poll: Duration,
}

impl FlushGate {
    pub fn new() -> Self {
        Self::with_poll(HOLD_POLL_INTERVAL)
    }

    /// Create a gate that re-checks at the given granularity
    pub fn with_poll(poll: Duration) -> Self {
        Self {
            held: AtomicBool::new(false),
            poll,
        }
    }

    /// Suppress output. Idempotent.
    pub fn hold(&self) {
        self.held.store(true, Ordering::Release);
    }

    /// Allow output again. Idempotent.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Poll until the gate is released or `give_up` returns true.
    ///
    /// Returns the number of poll rounds spent waiting.
    pub async fn wait_while_held(&self, give_up: impl Fn() -> bool) -> u32 {
        let mut rounds = 0;
        while self.is_held() && !give_up() {
            tokio::time::sleep(self.poll).await;
            rounds += 1;
        }
        rounds
    }
}

impl Default for FlushGate {
    fn default() -> Self {
        Self::new()
    }
}

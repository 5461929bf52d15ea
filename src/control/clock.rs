//! ClockGate - interruptible sleep between refresh cycles
//!
//! The gate remembers when the current cycle started so that collaborators
//! can show a "next refresh in Ns" hint, and lets another execution context
//! cut the sleep short with a [`WakeReason`].

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::WakeReason;

/// Longest sleep before the very first refresh
pub const FIRST_CYCLE_CAP_SECS: u64 = 3;

/// Interruptible wait with elapsed-time tracking
#[derive(Debug)]
pub struct ClockGate {
    /// Seconds between refreshes
    interval: AtomicU64,
    /// When the current cycle began
    cycle_start: Mutex<Instant>,
    /// Reason for the interrupt not yet observed by a sleeper
    pending: Mutex<Option<WakeReason>>,
    /// Wakes the sleeper; stores a permit if nobody is sleeping yet
    notify: Notify,
}

impl ClockGate {
    /// Create a gate with the given refresh interval (clamped to >= 1)
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval: AtomicU64::new(interval_secs.max(1)),
            cycle_start: Mutex::new(Instant::now()),
            pending: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Seconds between refreshes
    pub fn interval(&self) -> u64 {
        self.interval.load(Ordering::Acquire)
    }

    /// Change the refresh interval for subsequent cycles
    pub fn set_interval(&self, seconds: u64) {
        self.interval.store(seconds.max(1), Ordering::Release);
    }

    /// Sleep length for the given iteration; the first is capped so a fresh
    /// monitor shows real numbers quickly
    pub fn sleep_duration(&self, iteration: u64) -> u64 {
        let interval = self.interval();
        if iteration == 0 {
            interval.min(FIRST_CYCLE_CAP_SECS)
        } else {
            interval
        }
    }

    /// Record now as the start of the cycle
    pub fn begin_cycle(&self) {
        let mut start = self.cycle_start.lock().unwrap_or_else(|e| e.into_inner());
        *start = Instant::now();
    }

    /// Seconds left until the next refresh, never negative
    pub fn remaining_seconds(&self) -> u64 {
        let start = *self.cycle_start.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = Instant::now().saturating_duration_since(start).as_secs();
        self.interval().saturating_sub(elapsed)
    }

    /// Suspend for `seconds`.
    ///
    /// Returns `None` when the full time elapsed and `Some(reason)` when the
    /// sleep was interrupted. An interrupt raised while nobody was sleeping
    /// ends the next sleep immediately.
    pub async fn sleep_until_next(&self, seconds: u64) -> Option<WakeReason> {
        let deadline = Instant::now() + Duration::from_secs(seconds);
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(reason) = self.take_pending() {
                return Some(reason);
            }
            tokio::select! {
                _ = &mut notified => {
                    if let Some(reason) = self.take_pending() {
                        return Some(reason);
                    }
                    // wakeup for an interrupt that was cleared before this sleep
                }
                _ = tokio::time::sleep_until(deadline) => return None,
            }
        }
    }

    /// Drop interrupts raised before now. The frame about to be drawn
    /// already serves them.
    pub fn clear(&self) -> Option<WakeReason> {
        self.take_pending()
    }

    /// Wake the sleeper, or the next one if nobody is sleeping
    pub fn interrupt(&self, reason: WakeReason) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            *pending = Some(match *pending {
                Some(prev) => prev.merge(reason),
                None => reason,
            });
        }
        self.notify.notify_one();
    }

    fn take_pending(&self) -> Option<WakeReason> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

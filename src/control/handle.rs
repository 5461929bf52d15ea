//! Shared control block and the handle exposed to other execution contexts

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;

use crate::control::clock::ClockGate;
use crate::control::flush::{FlushGate, HOLD_POLL_INTERVAL};
use crate::domain::{ControlSignal, ViewCommand, WakeReason};

/// State shared across execution contexts. Owned by the controller.
#[derive(Debug)]
pub struct ControlBlock {
    exit_requested: AtomicBool,
    clock: ClockGate,
    flush: FlushGate,
    views: mpsc::UnboundedSender<ViewCommand>,
}

impl ControlBlock {
    /// Create the block together with the receiving end of the view queue
    pub fn new(interval_secs: u64) -> (Arc<Self>, mpsc::UnboundedReceiver<ViewCommand>) {
        Self::with_poll(interval_secs, HOLD_POLL_INTERVAL)
    }

    /// Like [`ControlBlock::new`] with a custom hold-poll granularity
    pub fn with_poll(
        interval_secs: u64,
        poll: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ViewCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let block = Self {
            exit_requested: AtomicBool::new(false),
            clock: ClockGate::new(interval_secs),
            flush: FlushGate::with_poll(poll),
            views: tx,
        };
        (Arc::new(block), rx)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }

    pub fn clock(&self) -> &ClockGate {
        &self.clock
    }

    pub fn flush(&self) -> &FlushGate {
        &self.flush
    }
}

/// Narrow mutation surface handed to the interactive channel and signal handlers
#[derive(Debug, Clone)]
pub struct ControlHandle {
    block: Arc<ControlBlock>,
}

impl ControlHandle {
    pub fn new(block: Arc<ControlBlock>) -> Self {
        Self { block }
    }

    /// Flag termination and wake the controller
    pub fn request_exit(&self) {
        debug!("Exit requested");
        self.block.exit_requested.store(true, Ordering::Release);
        self.block.clock.interrupt(WakeReason::Exit);
    }

    /// Cut the current sleep short without terminating
    pub fn interrupt_sleep(&self) {
        self.block.clock.interrupt(WakeReason::Refresh);
    }

    pub fn hold_output(&self) {
        self.block.flush.hold();
    }

    pub fn resume_output(&self) {
        self.block.flush.release();
    }

    pub fn seconds_until_next_refresh(&self) -> u64 {
        self.block.clock.remaining_seconds()
    }

    /// Current refresh interval in seconds
    pub fn interval(&self) -> u64 {
        self.block.clock.interval()
    }

    /// Queue a view change; applied by the controller before its next render
    pub fn send_view(&self, command: ViewCommand) {
        // receiver is gone only once the controller has terminated
        if self.block.views.send(command).is_err() {
            debug!("View command dropped, controller has stopped");
        }
    }

    /// Route a control signal to the matching operation
    pub fn dispatch(&self, signal: ControlSignal) {
        match signal {
            ControlSignal::RequestExit => self.request_exit(),
            ControlSignal::RequestInterruptSleep => self.interrupt_sleep(),
            ControlSignal::RequestSuppressOutput => self.hold_output(),
            ControlSignal::RequestResumeOutput => self.resume_output(),
            ControlSignal::View(command) => self.send_view(command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_exit_sets_flag() {
        let (block, _rx) = ControlBlock::new(5);
        let handle = ControlHandle::new(block.clone());
        assert!(!block.exit_requested());
        handle.request_exit();
        assert!(block.exit_requested());
    }

    #[test]
    fn test_interrupt_does_not_request_exit() {
        let (block, _rx) = ControlBlock::new(5);
        let handle = ControlHandle::new(block.clone());
        handle.interrupt_sleep();
        assert!(!block.exit_requested());
    }

    #[test]
    fn test_dispatch_suppression() {
        let (block, _rx) = ControlBlock::new(5);
        let handle = ControlHandle::new(block.clone());
        handle.dispatch(ControlSignal::RequestSuppressOutput);
        assert!(block.flush().is_held());
        handle.dispatch(ControlSignal::RequestResumeOutput);
        assert!(!block.flush().is_held());
    }

    #[test]
    fn test_dispatch_view_is_queued() {
        let (block, mut rx) = ControlBlock::new(5);
        let handle = ControlHandle::new(block);
        handle.dispatch(ControlSignal::View(ViewCommand::CycleSort));
        handle.dispatch(ControlSignal::View(ViewCommand::SetInterval(2)));
        assert_eq!(rx.try_recv().unwrap(), ViewCommand::CycleSort);
        assert_eq!(rx.try_recv().unwrap(), ViewCommand::SetInterval(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_view_after_receiver_dropped() {
        let (block, rx) = ControlBlock::new(5);
        drop(rx);
        let handle = ControlHandle::new(block);
        handle.send_view(ViewCommand::CycleSort);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_wakes_sleeper_with_exit_reason() {
        let (block, _rx) = ControlBlock::new(30);
        let handle = ControlHandle::new(block.clone());
        handle.request_exit();
        let reason = block.clock().sleep_until_next(30).await;
        assert_eq!(reason, Some(WakeReason::Exit));
    }
}

//! Controller - the sample/render/flush/sleep loop.
//!
//! Each cycle:
//! 1. Waits while output is held by the interactive channel
//! 2. Applies queued view changes, samples, renders one frame
//! 3. Flushes the frame
//! 4. Stops when the iteration limit is reached
//! 5. Sleeps until the next refresh or until interrupted

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::control::{ControlBlock, ControlHandle};
use crate::domain::{IterationLimit, RunConfig, ViewCommand, WakeReason};
use crate::error::{Result, StackTopError};
use crate::render::{FrameStatus, Renderer};
use crate::runner::state::{LoopState, Phase};
use crate::sampler::Sampler;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The iteration limit was reached
    Completed { renders: u64 },
    /// Exit was requested
    Exited { renders: u64 },
    /// Sampling became impossible; guidance was printed
    RuntimeMissing { renders: u64 },
    /// The target could not be attached; the loop never started
    AttachFailed,
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            Self::AttachFailed => 2,
            _ => 0,
        }
    }
}

/// Drives the monitoring loop for one attached process
pub struct Controller<S, R, W>
where
    S: Sampler,
    R: Renderer,
    W: Write + Send,
{
    sampler: S,
    renderer: R,
    /// Buffered sink; only the controller flushes it
    out: W,
    block: Arc<ControlBlock>,
    views: mpsc::UnboundedReceiver<ViewCommand>,
    limit: IterationLimit,
    state: LoopState,
}

impl<S, R, W> Controller<S, R, W>
where
    S: Sampler,
    R: Renderer,
    W: Write + Send,
{
    /// Create a controller in the `Init` phase
    pub fn new(config: &RunConfig, sampler: S, renderer: R, out: W) -> Self {
        let (block, views) = ControlBlock::new(config.refresh_interval);
        Self::with_block(config, sampler, renderer, out, block, views)
    }

    /// Create a controller around an existing control block
    pub fn with_block(
        config: &RunConfig,
        sampler: S,
        renderer: R,
        out: W,
        block: Arc<ControlBlock>,
        views: mpsc::UnboundedReceiver<ViewCommand>,
    ) -> Self {
        Self {
            sampler,
            renderer,
            out,
            block,
            views,
            limit: config.max_iterations,
            state: LoopState::new(),
        }
    }

    /// Handle for other execution contexts to steer this loop
    pub fn handle(&self) -> ControlHandle {
        ControlHandle::new(self.block.clone())
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Consume the controller, returning its output sink
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until the iteration limit or an exit request.
    ///
    /// A missing runtime ends the loop with guidance instead of an error;
    /// anything else is returned to the caller.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        info!("Monitoring pid {} ({:?})", self.sampler.pid(), self.limit);
        self.state.transition(Phase::Running);

        match self.run_cycles().await {
            Ok(()) => {
                self.finish()?;
                let renders = self.state.renders;
                if self.block.exit_requested() {
                    Ok(RunOutcome::Exited { renders })
                } else {
                    Ok(RunOutcome::Completed { renders })
                }
            }
            Err(e) if e.is_runtime_missing() => {
                error!("Stopping: {}", e);
                self.report_runtime_missing(&e)?;
                self.state.transition(Phase::Terminated);
                Ok(RunOutcome::RuntimeMissing {
                    renders: self.state.renders,
                })
            }
            Err(e) => {
                error!("Loop failed: {}", e);
                self.state.transition(Phase::Terminated);
                let _ = self.out.flush();
                Err(e)
            }
        }
    }

    async fn run_cycles(&mut self) -> Result<()> {
        let block = self.block.clone();
        let clock = block.clock();

        while !block.exit_requested() {
            let rounds = block.flush().wait_while_held(|| block.exit_requested()).await;
            if rounds > 0 {
                debug!("Output was held for {} poll rounds", rounds);
            }
            if block.exit_requested() {
                break;
            }

            self.apply_view_commands();
            if let Some(reason) = clock.clear() {
                debug!("Refresh request {:?} served by this frame", reason);
            }
            let snapshot = self.sampler.sample().await?;
            let status = FrameStatus {
                iteration: self.state.renders,
                interval: clock.interval(),
            };
            self.renderer.render(&snapshot, status, &mut self.out)?;
            self.state.renders += 1;
            if block.exit_requested() {
                break;
            }

            self.out.flush()?;

            if self.limit.reached(self.state.renders) {
                debug!("Iteration limit reached after {} frames", self.state.renders);
                break;
            }

            let seconds = clock.sleep_duration(self.state.iteration_count);
            self.state.iteration_count += 1;
            clock.begin_cycle();
            match clock.sleep_until_next(seconds).await {
                Some(WakeReason::Exit) => debug!("Woken to exit"),
                Some(WakeReason::Refresh) => debug!("Woken early to refresh"),
                None => {}
            }
        }
        Ok(())
    }

    fn apply_view_commands(&mut self) {
        while let Ok(command) = self.views.try_recv() {
            debug!("Applying view command {:?}", command);
            if let ViewCommand::SetInterval(seconds) = command {
                self.block.clock().set_interval(seconds);
            }
            self.renderer.apply(&command);
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.state.transition(Phase::Exiting);
        writeln!(self.out)?;
        self.out.flush()?;
        self.state.transition(Phase::Terminated);
        info!("Loop finished after {} frames", self.state.renders);
        Ok(())
    }

    fn report_runtime_missing(&mut self, err: &StackTopError) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", format!("ERROR: {}", err).red())?;
        writeln!(
            self.out,
            "       Thread statistics cannot be read. Check that procfs is mounted,"
        )?;
        writeln!(self.out, "       or point --proc-root at a procfs mount.")?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttachTarget, ThreadSort};
    use crate::sampler::{MemoryUsage, Snapshot};
    use async_trait::async_trait;
    use chrono::Local;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    struct FakeSampler {
        samples: u64,
        fail_at: Option<(u64, fn() -> StackTopError)>,
    }

    impl FakeSampler {
        fn new() -> Self {
            Self {
                samples: 0,
                fail_at: None,
            }
        }

        fn failing_at(sample: u64, err: fn() -> StackTopError) -> Self {
            Self {
                samples: 0,
                fail_at: Some((sample, err)),
            }
        }
    }

    #[async_trait]
    impl Sampler for FakeSampler {
        fn pid(&self) -> u32 {
            7
        }

        async fn sample(&mut self) -> Result<Snapshot> {
            if let Some((at, err)) = self.fail_at {
                if self.samples == at {
                    return Err(err());
                }
            }
            self.samples += 1;
            Ok(Snapshot {
                pid: 7,
                process_name: "fake".to_string(),
                taken_at: Local::now(),
                memory: MemoryUsage::default(),
                threads: Vec::new(),
                process_cpu_percent: 0.0,
                window_ms: 0,
            })
        }
    }

    #[derive(Default)]
    struct Recorded {
        frames: Vec<(Instant, FrameStatus)>,
        commands: Vec<ViewCommand>,
    }

    struct RecordingRenderer {
        log: Arc<Mutex<Recorded>>,
    }

    impl Renderer for RecordingRenderer {
        fn apply(&mut self, command: &ViewCommand) {
            self.log.lock().unwrap().commands.push(command.clone());
        }

        fn render(&mut self, _snapshot: &Snapshot, status: FrameStatus, out: &mut dyn Write) -> Result<()> {
            self.log.lock().unwrap().frames.push((Instant::now(), status));
            writeln!(out, "frame {}", status.iteration)?;
            Ok(())
        }
    }

    type TestController = Controller<FakeSampler, RecordingRenderer, Vec<u8>>;

    fn controller(interval: u64, limit: IterationLimit, sampler: FakeSampler) -> (TestController, Arc<Mutex<Recorded>>) {
        let config = RunConfig::new(AttachTarget::Pid(7))
            .with_interval(interval)
            .with_max_iterations(limit)
            .with_sort(ThreadSort::Cpu);
        let log = Arc::new(Mutex::new(Recorded::default()));
        let renderer = RecordingRenderer { log: log.clone() };
        (Controller::new(&config, sampler, renderer, Vec::new()), log)
    }

    fn offsets(log: &Arc<Mutex<Recorded>>, start: Instant) -> Vec<u64> {
        log.lock()
            .unwrap()
            .frames
            .iter()
            .map(|(at, _)| at.duration_since(start).as_secs())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_run_renders_exactly_n_frames() {
        let (mut controller, log) = controller(5, IterationLimit::Bounded(3), FakeSampler::new());
        assert_eq!(controller.state().phase, Phase::Init);

        let start = Instant::now();
        let outcome = controller.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed { renders: 3 });
        assert!(controller.state().is_terminated());
        // first sleep capped at 3s, then the full interval
        assert_eq!(offsets(&log, start), vec![0, 3, 8]);
        assert_eq!(start.elapsed(), Duration::from_secs(8));

        let out = String::from_utf8(controller.into_output()).unwrap();
        assert_eq!(out, "frame 0\nframe 1\nframe 2\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_interval_first_sleep() {
        let (mut controller, log) = controller(2, IterationLimit::Bounded(3), FakeSampler::new());
        let start = Instant::now();
        controller.run().await.unwrap();
        assert_eq!(offsets(&log, start), vec![0, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_run_stops_on_exit_request() {
        let (mut controller, log) = controller(5, IterationLimit::Unbounded, FakeSampler::new());
        let handle = controller.handle();
        let task = tokio::spawn(async move {
            let outcome = controller.run().await;
            (outcome, controller)
        });

        tokio::time::sleep(Duration::from_secs(12)).await;
        let frames_before = log.lock().unwrap().frames.len();
        let exit_at = Instant::now();
        handle.request_exit();

        let (outcome, controller) = task.await.unwrap();
        assert!(exit_at.elapsed() <= Duration::from_secs(1));
        assert_eq!(outcome.unwrap(), RunOutcome::Exited { renders: 3 });
        assert!(controller.state().is_terminated());
        // frames at 0, 3, 8; no new cycle after the request
        assert_eq!(frames_before, 3);
        assert_eq!(log.lock().unwrap().frames.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_refreshes_without_exiting() {
        let (mut controller, log) = controller(60, IterationLimit::Bounded(3), FakeSampler::new());
        let handle = controller.handle();
        let start = Instant::now();
        let task = tokio::spawn(async move {
            let outcome = controller.run().await;
            (outcome, controller)
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.interrupt_sleep();
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.interrupt_sleep();

        let (outcome, _) = task.await.unwrap();
        assert_eq!(outcome.unwrap(), RunOutcome::Completed { renders: 3 });
        assert_eq!(offsets(&log, start), vec![0, 3, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_blocks_rendering_until_resume() {
        let (mut controller, log) = controller(5, IterationLimit::Bounded(1), FakeSampler::new());
        let handle = controller.handle();
        handle.hold_output();
        let start = Instant::now();
        let task = tokio::spawn(async move { controller.run().await });

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert!(log.lock().unwrap().frames.is_empty());
        handle.resume_output();

        task.await.unwrap().unwrap();
        let frames = log.lock().unwrap().frames.clone();
        assert_eq!(frames.len(), 1);
        let rendered_at = frames[0].0.duration_since(start);
        assert!(rendered_at >= Duration::from_millis(4500));
        assert!(rendered_at <= Duration::from_millis(5500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_requested_while_held_renders_once() {
        let (mut controller, log) = controller(5, IterationLimit::Unbounded, FakeSampler::new());
        let handle = controller.handle();
        let start = Instant::now();
        let task = tokio::spawn(async move { controller.run().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.hold_output();
        // the 3s sleep expires while held; the answer arrives afterwards
        tokio::time::sleep(Duration::from_millis(5500)).await;
        handle.resume_output();
        handle.interrupt_sleep();
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.request_exit();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Exited { renders: 2 });
        assert_eq!(offsets(&log, start), vec![0, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_while_held_terminates() {
        let (mut controller, log) = controller(5, IterationLimit::Unbounded, FakeSampler::new());
        let handle = controller.handle();
        handle.hold_output();
        let task = tokio::spawn(async move { controller.run().await });

        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.request_exit();
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Exited { renders: 0 });
        assert!(log.lock().unwrap().frames.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_commands_applied_before_render() {
        let (mut controller, log) = controller(5, IterationLimit::Bounded(2), FakeSampler::new());
        let handle = controller.handle();
        handle.send_view(ViewCommand::SetInterval(1));
        handle.send_view(ViewCommand::CycleSort);

        let start = Instant::now();
        controller.run().await.unwrap();

        let recorded = log.lock().unwrap();
        assert_eq!(recorded.commands, vec![ViewCommand::SetInterval(1), ViewCommand::CycleSort]);
        assert_eq!(recorded.frames[0].1.interval, 1);
        drop(recorded);
        assert_eq!(offsets(&log, start), vec![0, 1]);
        assert_eq!(handle.interval(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_missing_ends_gracefully() {
        let sampler = FakeSampler::failing_at(1, || StackTopError::RuntimeMissing("procfs gone".to_string()));
        let (mut controller, log) = controller(1, IterationLimit::Unbounded, sampler);

        let outcome = controller.run().await.unwrap();
        assert_eq!(outcome, RunOutcome::RuntimeMissing { renders: 1 });
        assert_eq!(outcome.exit_code(), 0);
        assert!(controller.state().is_terminated());
        assert_eq!(log.lock().unwrap().frames.len(), 1);

        let out = String::from_utf8(controller.into_output()).unwrap();
        assert!(out.contains("procfs gone"));
        assert!(out.contains("--proc-root"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_failure_ends_run_with_error() {
        let sampler = FakeSampler::failing_at(0, || StackTopError::Sample("process 7 has exited".to_string()));
        let (mut controller, log) = controller(1, IterationLimit::Unbounded, sampler);

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, StackTopError::Sample(_)));
        assert!(controller.state().is_terminated());
        assert!(log.lock().unwrap().frames.is_empty());
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(RunOutcome::Completed { renders: 1 }.exit_code(), 0);
        assert_eq!(RunOutcome::Exited { renders: 1 }.exit_code(), 0);
        assert_eq!(RunOutcome::AttachFailed.exit_code(), 2);
    }
}

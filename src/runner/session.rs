//! Session - everything between a validated config and the loop's end.
//!
//! Negotiates the output mode, attaches the sampler, builds the renderer,
//! starts the interactive channel (or a SIGINT listener) and runs the
//! controller.

use std::io::{BufWriter, Write};

use colored::Colorize;
use log::{error, info, warn};

use crate::control::ControlHandle;
use crate::domain::RunConfig;
use crate::error::{Result, StackTopError};
use crate::interactive::{InteractiveChannel, TerminalConsole};
use crate::render::{ThreadTableRenderer, ViewOptions};
use crate::runner::controller::{Controller, RunOutcome};
use crate::sampler::ProcSampler;
use crate::terminal::{self, CrlfWriter, RawModeGuard};

/// Capacity of the stdout buffer; one frame fits comfortably
const OUTPUT_BUFFER_BYTES: usize = 64 * 1024;

/// Run a monitoring session, writing frames to `out`
pub async fn run_session<W>(config: RunConfig, out: W) -> Result<RunOutcome>
where
    W: Write + Send + 'static,
{
    let plan = terminal::negotiate(
        config.output_format,
        config.output_is_interactive,
        config.max_iterations,
    );
    terminal::apply_color_mode(plan.format);
    info!("Output format {}, interactive: {}", plan.format.name(), plan.interactive);

    let mut out = BufWriter::with_capacity(OUTPUT_BUFFER_BYTES, out);

    let sampler = match config
        .target
        .resolve()
        .and_then(|pid| ProcSampler::attach(&config.proc_root, pid))
    {
        Ok(sampler) => sampler,
        Err(e) => {
            error!("Attach failed: {}", e);
            report_attach_failure(&mut out, &e)?;
            return Ok(RunOutcome::AttachFailed);
        }
    };

    let renderer = ThreadTableRenderer::new(ViewOptions::from_config(&config, plan.format, plan.interactive));

    if !plan.interactive {
        let mut controller = Controller::new(&config, sampler, renderer, out);
        listen_for_sigint(controller.handle());
        return controller.run().await;
    }

    let _raw = RawModeGuard::enable()?;
    let mut controller = Controller::new(&config, sampler, renderer, CrlfWriter::new(out));
    let channel = InteractiveChannel::new(controller.handle(), TerminalConsole::new());
    if let Err(e) = channel.spawn() {
        warn!("Could not start interactive channel: {}", e);
        listen_for_sigint(controller.handle());
    }
    controller.run().await
}

/// Turn Ctrl-C into an exit request when keys are not being read
fn listen_for_sigint(handle: ControlHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            handle.request_exit();
        }
    });
}

fn report_attach_failure(out: &mut impl Write, err: &StackTopError) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", format!("ERROR: {}", err).red())?;
    match err {
        StackTopError::RuntimeMissing(_) => {
            writeln!(out, "       procfs is required. Mount it, or pass --proc-root.")?;
        }
        _ => {
            writeln!(
                out,
                "       Check the pid, and run as the same user as the target process (or root)."
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

//! Rendering of snapshots into text frames
//!
//! The controller owns stdout; a [`Renderer`] only writes one frame into
//! the sink it is given and never flushes it.

pub mod table;

use std::io::Write;

use crate::domain::ViewCommand;
use crate::error::Result;
use crate::sampler::Snapshot;

pub use table::{ThreadTableRenderer, ViewOptions};

/// Loop facts a frame may display alongside the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStatus {
    /// Zero-based render cycle number
    pub iteration: u64,
    /// Seconds between refreshes
    pub interval: u64,
}

/// Turns a snapshot into one frame of output
pub trait Renderer: Send {
    /// Apply a view change requested interactively
    fn apply(&mut self, command: &ViewCommand);

    /// Write one complete frame for `snapshot`
    fn render(&mut self, snapshot: &Snapshot, status: FrameStatus, out: &mut dyn Write) -> Result<()>;
}

//! Domain types for stacktop
//!
//! - RunConfig: the immutable run configuration and its attach target
//! - Signal: control signals flowing from the interactive channel to the controller
//! - Format: output format and thread sort order

pub mod format;
pub mod run_config;
pub mod signal;

pub use format::{OutputFormat, ThreadSort};
pub use run_config::{AttachTarget, IterationLimit, RunConfig};
pub use signal::{ControlSignal, ViewCommand, WakeReason};

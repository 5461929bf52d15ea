//! stacktop - top for the threads of a single process
//!
//! stacktop attaches to a running process, samples its threads and memory on
//! a fixed interval, and renders a live view to the terminal. Single-key
//! commands change what is shown without restarting the sampling loop.

pub mod control;
pub mod domain;
pub mod error;
pub mod interactive;
pub mod render;
pub mod runner;
pub mod sampler;
pub mod terminal;

pub use error::{Result, StackTopError};

//! The monitoring loop.
//!
//! The [`Controller`] runs wait → sample+render → flush → sleep until the
//! iteration limit is reached or an exit is requested. [`session`] wires the
//! controller to the procfs sampler, the table renderer, the terminal and
//! the interactive channel.

pub mod controller;
pub mod session;
pub mod state;

pub use controller::{Controller, RunOutcome};
pub use session::run_session;
pub use state::{LoopState, Phase};

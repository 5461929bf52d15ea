//! Coordination primitives shared between the controller and the
//! interactive channel.
//!
//! The flags live in one [`ControlBlock`]; other execution contexts only ever
//! see it through a [`ControlHandle`].

pub mod clock;
pub mod flush;
pub mod handle;

pub use clock::{ClockGate, FIRST_CYCLE_CAP_SECS};
pub use flush::{FlushGate, HOLD_POLL_INTERVAL};
pub use handle::{ControlBlock, ControlHandle};

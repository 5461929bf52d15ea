//! Interactive channel: single-key commands read from the terminal while
//! the loop keeps running.

pub mod channel;
pub mod keys;

pub use channel::{Console, InteractiveChannel, TerminalConsole};
pub use keys::{HELP_TEXT, KeyAction, Prompt, map_key};

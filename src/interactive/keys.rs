//! Key bindings
//!
//! Maps single key presses to control signals, prompts, or nothing.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::domain::{ControlSignal, ViewCommand};

/// Help shown for `h` / `?`
pub const HELP_TEXT: &str = "\
 Commands:
   q / Ctrl-C  quit
   r / space   refresh now
   s           change sort order (cpu, syscpu, totalcpu, totalsyscpu)
   f           filter threads by name (empty clears)
   l           limit the number of threads shown (empty shows all)
   i           change the refresh interval in seconds
   h / ?       show this help";

/// What to do in response to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Dispatch these signals in order
    Send(Vec<ControlSignal>),
    /// Ask the user for a value, then apply it
    Prompt(Prompt),
    /// Show the key help
    Help,
    /// Unrecognised key
    Ignore,
}

/// A question that needs a line of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Filter,
    Limit,
    Interval,
}

impl Prompt {
    pub fn question(self) -> &'static str {
        match self {
            Self::Filter => " Thread name filter (empty to clear): ",
            Self::Limit => " Number of threads to show (empty for all): ",
            Self::Interval => " Refresh interval in seconds: ",
        }
    }

    /// Turn the answer into a view change; `None` means ignore it
    pub fn parse(self, answer: &str) -> Option<ViewCommand> {
        let answer = answer.trim();
        match self {
            Self::Filter if answer.is_empty() => Some(ViewCommand::SetFilter(None)),
            Self::Filter => Some(ViewCommand::SetFilter(Some(answer.to_string()))),
            Self::Limit if answer.is_empty() => Some(ViewCommand::SetLimit(None)),
            Self::Limit => match answer.parse::<usize>() {
                Ok(n) if n > 0 => Some(ViewCommand::SetLimit(Some(n))),
                _ => None,
            },
            Self::Interval => match answer.parse::<u64>() {
                Ok(n) if n > 0 => Some(ViewCommand::SetInterval(n)),
                _ => None,
            },
        }
    }
}

/// Map a key press to an action
pub fn map_key(key: &KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => KeyAction::Send(vec![ControlSignal::RequestExit]),
            _ => KeyAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => KeyAction::Send(vec![ControlSignal::RequestExit]),
        KeyCode::Char('r') | KeyCode::Char(' ') | KeyCode::Enter => {
            KeyAction::Send(vec![ControlSignal::RequestInterruptSleep])
        }
        KeyCode::Char('s') => KeyAction::Send(vec![
            ControlSignal::View(ViewCommand::CycleSort),
            ControlSignal::RequestInterruptSleep,
        ]),
        KeyCode::Char('f') => KeyAction::Prompt(Prompt::Filter),
        KeyCode::Char('l') => KeyAction::Prompt(Prompt::Limit),
        KeyCode::Char('i') => KeyAction::Prompt(Prompt::Interval),
        KeyCode::Char('h') | KeyCode::Char('?') => KeyAction::Help,
        _ => KeyAction::Ignore,
    }
}

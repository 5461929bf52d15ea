//! Output format and thread sort order

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How frames are written to standard output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Clear the screen between frames and colour the view
    #[default]
    Console,
    /// Console layout without any escape codes, safe to redirect to a file
    #[value(name = "clean")]
    #[serde(rename = "clean")]
    CleanConsole,
    /// Append frames one after another, no terminal control codes at all
    Text,
}

impl OutputFormat {
    /// Whether ANSI colour codes are emitted
    pub fn ansi(self) -> bool {
        matches!(self, Self::Console)
    }

    /// Sequence written before every frame
    pub fn frame_prefix(self) -> &'static str {
        match self {
            // home cursor, clear screen
            Self::Console => "\x1b[H\x1b[2J",
            Self::CleanConsole => "\n\n",
            Self::Text => "\n",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::CleanConsole => "clean",
            Self::Text => "text",
        }
    }
}

/// Column the thread table is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadSort {
    /// CPU time (user+sys) used during the last interval
    #[default]
    Cpu,
    /// System CPU time used during the last interval
    Syscpu,
    /// CPU time used since the thread started
    Totalcpu,
    /// System CPU time used since the thread started
    Totalsyscpu,
}

impl ThreadSort {
    /// Cycle to the next sort order
    pub fn next(self) -> Self {
        match self {
            Self::Cpu => Self::Syscpu,
            Self::Syscpu => Self::Totalcpu,
            Self::Totalcpu => Self::Totalsyscpu,
            Self::Totalsyscpu => Self::Cpu,
        }
    }

    /// Get the sort name for display
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Syscpu => "syscpu",
            Self::Totalcpu => "totalcpu",
            Self::Totalsyscpu => "totalsyscpu",
        }
    }
}

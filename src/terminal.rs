//! Terminal mode handling
//!
//! Decides the output format for a run, switches colour on or off, and
//! manages raw mode while the interactive channel is reading keys.

use std::io::{self, Write};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;
use log::{debug, warn};

use crate::domain::{IterationLimit, OutputFormat};

/// Output decisions made once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPlan {
    /// Format frames are rendered in
    pub format: OutputFormat,
    /// Whether to start the interactive key listener
    pub interactive: bool,
}

/// Pick the output format and whether keys are read.
///
/// - a bounded run is forced to plain text and never reads keys
/// - output that is not a terminal falls back to the clean console format
/// - otherwise the requested format is kept and keys are read, unless plain
///   text was asked for
pub fn negotiate(requested: OutputFormat, stdout_is_tty: bool, limit: IterationLimit) -> OutputPlan {
    if limit.is_bounded() {
        return OutputPlan {
            format: OutputFormat::Text,
            interactive: false,
        };
    }
    if requested == OutputFormat::Text {
        return OutputPlan {
            format: OutputFormat::Text,
            interactive: false,
        };
    }
    if !stdout_is_tty {
        return OutputPlan {
            format: OutputFormat::CleanConsole,
            interactive: false,
        };
    }
    OutputPlan {
        format: requested,
        interactive: true,
    }
}

/// Whether standard output is attached to a terminal
pub fn stdout_is_tty() -> bool {
    io::stdout().is_tty()
}

/// Turn colour output on or off for the whole process
pub fn apply_color_mode(format: OutputFormat) {
    colored::control::set_override(format.ansi());
}

/// Keeps the terminal in raw mode until dropped
#[derive(Debug)]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        debug!("Raw mode enabled");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Writer that emits `\r\n` for every `\n`, for use while the terminal is in
/// raw mode (where the tty no longer adds the carriage return itself)
#[derive(Debug)]
pub struct CrlfWriter<W: Write> {
    inner: W,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, byte) in buf.iter().enumerate() {
            if *byte == b'\n' {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

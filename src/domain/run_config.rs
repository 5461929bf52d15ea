//! Run configuration
//!
//! `RunConfig` is built once from the command line (and optional config file)
//! and is read-only for the rest of the run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::format::{OutputFormat, ThreadSort};
use crate::error::{Result, StackTopError};

/// Default seconds between refreshes
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Default number of threads shown
pub const DEFAULT_THREAD_LIMIT: usize = 10;

/// What process to attach to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachTarget {
    /// A numeric process id
    Pid(u32),
    /// A file whose first line holds the process id
    PidFile(PathBuf),
}

impl AttachTarget {
    /// Resolve the target to a process id
    pub fn resolve(&self) -> Result<u32> {
        match self {
            Self::Pid(pid) => Ok(*pid),
            Self::PidFile(path) => read_pid_file(path),
        }
    }
}

fn read_pid_file(path: &Path) -> Result<u32> {
    let content = fs::read_to_string(path)?;
    let line = content.lines().next().unwrap_or("").trim();
    line.parse::<u32>().map_err(|_| {
        StackTopError::InvalidConfig(format!("{} does not contain a pid: {:?}", path.display(), line))
    })
}

/// How many render cycles to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationLimit {
    /// Run until asked to exit
    #[default]
    Unbounded,
    /// Render exactly this many frames, then exit
    Bounded(u32),
}

impl IterationLimit {
    /// Convert the command-line count (`-1` = unbounded)
    pub fn from_count(count: i64) -> Result<Self> {
        match count {
            -1 => Ok(Self::Unbounded),
            n if n >= 1 => u32::try_from(n)
                .map(Self::Bounded)
                .map_err(|_| StackTopError::InvalidConfig(format!("iteration count too large: {}", n))),
            n => Err(StackTopError::InvalidConfig(format!(
                "iteration count must be -1 or at least 1, got {}",
                n
            ))),
        }
    }

    pub fn is_bounded(self) -> bool {
        matches!(self, Self::Bounded(_))
    }

    /// Whether `renders` completed frames exhaust the limit
    pub fn reached(self, renders: u64) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Bounded(max) => renders >= u64::from(max),
        }
    }
}

/// Immutable configuration for a monitoring run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Process to attach to
    pub target: AttachTarget,
    /// Root of the procfs mount to read from
    pub proc_root: PathBuf,
    /// Seconds between refreshes (>= 1)
    pub refresh_interval: u64,
    /// How many frames to render
    pub max_iterations: IterationLimit,
    /// Whether stdout is an interactive terminal
    pub output_is_interactive: bool,
    /// Requested output format (may be downgraded at startup)
    pub output_format: OutputFormat,
    /// Clip lines to this many columns
    pub display_width: Option<usize>,
    /// Show at most this many threads
    pub thread_limit: Option<usize>,
    /// Only show threads whose name contains this
    pub name_filter: Option<String>,
    /// Initial sort order
    pub sort: ThreadSort,
}

impl RunConfig {
    /// Create a config for the given target with default settings
    pub fn new(target: AttachTarget) -> Self {
        Self {
            target,
            proc_root: PathBuf::from("/proc"),
            refresh_interval: DEFAULT_INTERVAL_SECS,
            max_iterations: IterationLimit::Unbounded,
            output_is_interactive: false,
            output_format: OutputFormat::Console,
            display_width: None,
            thread_limit: Some(DEFAULT_THREAD_LIMIT),
            name_filter: None,
            sort: ThreadSort::Cpu,
        }
    }

    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.refresh_interval = seconds;
        self
    }

    pub fn with_max_iterations(mut self, limit: IterationLimit) -> Self {
        self.max_iterations = limit;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.output_is_interactive = interactive;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    pub fn with_width(mut self, width: Option<usize>) -> Self {
        self.display_width = width;
        self
    }

    pub fn with_thread_limit(mut self, limit: Option<usize>) -> Self {
        self.thread_limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.name_filter = filter.filter(|f| !f.is_empty());
        self
    }

    pub fn with_sort(mut self, sort: ThreadSort) -> Self {
        self.sort = sort;
        self
    }

    /// Check the invariants the controller relies on
    pub fn validate(self) -> Result<Self> {
        if self.refresh_interval < 1 {
            return Err(StackTopError::InvalidConfig(
                "refresh interval must be at least 1 second".to_string(),
            ));
        }
        if self.display_width == Some(0) {
            return Err(StackTopError::InvalidConfig("width must be positive".to_string()));
        }
        if self.thread_limit == Some(0) {
            return Err(StackTopError::InvalidConfig("limit must be positive".to_string()));
        }
        Ok(self)
    }
}

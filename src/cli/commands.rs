//! CLI definition using clap.
//!
//! `stacktop [OPTIONS] <PID>` with options for the refresh interval,
//! iteration count, thread limit/filter, display width and output format.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;

use stacktop::domain::{AttachTarget, IterationLimit, OutputFormat, RunConfig, ThreadSort};
use stacktop::error::{Result, StackTopError};

use crate::config::Config;

/// Thread monitoring for the command-line
#[derive(Parser, Debug)]
#[command(name = "stacktop")]
#[command(author, version, about, long_about = None)]
#[command(help_template = "{name} {version} - {about}\n{usage-heading} {usage}\n\n{all-args}")]
pub struct Cli {
    /// Process id to monitor
    #[arg(required_unless_present = "pid_file", conflicts_with = "pid_file")]
    pub pid: Option<u32>,

    /// Read the process id from this file instead
    #[arg(long, value_name = "PATH")]
    pub pid_file: Option<PathBuf>,

    /// Seconds between refreshes
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Number of refreshes before exiting (-1 runs until quit)
    #[arg(short = 'n', long = "iterations", value_name = "COUNT", default_value_t = -1, allow_negative_numbers = true)]
    pub iterations: i64,

    /// Maximum number of threads to show
    #[arg(short, long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Only show threads whose name contains this text
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,

    /// Clip output to this many columns
    #[arg(short, long, value_name = "COLUMNS")]
    pub width: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Initial sort order
    #[arg(short, long, value_enum)]
    pub sort: Option<ThreadSort>,

    /// Root of the procfs mount to read
    #[arg(long, value_name = "DIR")]
    pub proc_root: Option<PathBuf>,

    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn target(&self) -> Result<AttachTarget> {
        match (&self.pid_file, self.pid) {
            (Some(path), _) => Ok(AttachTarget::PidFile(path.clone())),
            (None, Some(pid)) => Ok(AttachTarget::Pid(pid)),
            (None, None) => Err(StackTopError::InvalidConfig("a pid or --pid-file is required".to_string())),
        }
    }

    /// Merge flags over the file config into a validated run configuration
    pub fn to_run_config(&self, config: &Config, stdout_is_tty: bool) -> Result<RunConfig> {
        RunConfig::new(self.target()?)
            .with_proc_root(self.proc_root.clone().unwrap_or_else(|| config.proc_root.clone()))
            .with_interval(self.interval.unwrap_or(config.interval))
            .with_max_iterations(IterationLimit::from_count(self.iterations)?)
            .with_interactive(stdout_is_tty)
            .with_output_format(self.output.unwrap_or(config.output))
            .with_width(self.width.or(config.width))
            .with_thread_limit(Some(self.limit.unwrap_or(config.limit)))
            .with_filter(self.filter.clone())
            .with_sort(self.sort.unwrap_or(config.sort))
            .validate()
    }

    /// Report a rejected run configuration the way clap reports bad flags
    pub fn usage_error(err: &StackTopError) -> clap::Error {
        let message = match err {
            StackTopError::InvalidConfig(message) => message.clone(),
            other => other.to_string(),
        };
        Self::command().error(ErrorKind::ValueValidation, message)
    }
}

//! Thread table renderer
//!
//! Layout:
//!
//! ```text
//!  PID: 4242 - 12:00:01 - app, threads: 31 (RUNNING: 2, SLEEPING: 29)
//!  CPU: 12.50%  RSS: 50.78m  VIRT: 5.33g  SWAP: 0k
//!
//!      TID NAME                      STATE       CPU   SYSCPU    TOTAL TOTALSYS
//!     4243 worker-1                  RUNNING    9.80%   1.00%   12.34s    2.10s
//! ```

use std::io::Write;

use colored::Colorize;

use crate::domain::{OutputFormat, RunConfig, ThreadSort, ViewCommand};
use crate::error::Result;
use crate::render::{FrameStatus, Renderer};
use crate::sampler::{Snapshot, ThreadSample, ThreadState};

const NAME_WIDTH: usize = 25;

/// Threads above this CPU share are highlighted in red
const HOT_CPU_PERCENT: f64 = 50.0;

/// Threads above this CPU share are highlighted in yellow
const WARM_CPU_PERCENT: f64 = 10.0;

/// What the table shows; changed interactively through [`ViewCommand`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub format: OutputFormat,
    pub width: Option<usize>,
    pub limit: Option<usize>,
    pub filter: Option<String>,
    pub sort: ThreadSort,
    /// Print the command hint line under the table
    pub show_hints: bool,
}

impl ViewOptions {
    pub fn from_config(config: &RunConfig, format: OutputFormat, show_hints: bool) -> Self {
        Self {
            format,
            width: config.display_width,
            limit: config.thread_limit,
            filter: config.name_filter.clone(),
            sort: config.sort,
            show_hints,
        }
    }
}

/// Renders the busiest threads of a snapshot as a table
#[derive(Debug)]
pub struct ThreadTableRenderer {
    options: ViewOptions,
}

impl ThreadTableRenderer {
    pub fn new(options: ViewOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Threads to show, filtered, sorted and limited
    fn visible<'a>(&self, snapshot: &'a Snapshot) -> (Vec<&'a ThreadSample>, usize) {
        let filter = self.options.filter.as_ref().map(|f| f.to_lowercase());
        let mut threads: Vec<&ThreadSample> = snapshot
            .threads
            .iter()
            .filter(|t| match &filter {
                Some(f) => t.name.to_lowercase().contains(f),
                None => true,
            })
            .collect();
        let matched = threads.len();

        let key = |t: &ThreadSample| -> u64 {
            match self.options.sort {
                ThreadSort::Cpu => t.cpu_ms(),
                ThreadSort::Syscpu => t.sys_ms,
                ThreadSort::Totalcpu => t.total_cpu_ms(),
                ThreadSort::Totalsyscpu => t.total_sys_ms,
            }
        };
        threads.sort_by(|a, b| key(b).cmp(&key(a)).then(a.tid.cmp(&b.tid)));

        if let Some(limit) = self.options.limit {
            threads.truncate(limit);
        }
        (threads, matched)
    }

    fn clip(&self, line: String) -> String {
        match self.options.width {
            Some(width) if line.chars().count() > width => line.chars().take(width).collect(),
            _ => line,
        }
    }

    fn write_line(&self, out: &mut dyn Write, line: String, style: Style) -> Result<()> {
        let line = self.clip(line);
        if !self.options.format.ansi() {
            writeln!(out, "{}", line)?;
            return Ok(());
        }
        match style {
            Style::Plain => writeln!(out, "{}", line)?,
            Style::Bold => writeln!(out, "{}", line.bold())?,
            Style::Hot => writeln!(out, "{}", line.red())?,
            Style::Warm => writeln!(out, "{}", line.yellow())?,
            Style::Dim => writeln!(out, "{}", line.dimmed())?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Plain,
    Bold,
    Hot,
    Warm,
    Dim,
}

impl Renderer for ThreadTableRenderer {
    fn apply(&mut self, command: &ViewCommand) {
        match command {
            ViewCommand::SetFilter(filter) => {
                self.options.filter = filter.clone().filter(|f| !f.is_empty());
            }
            ViewCommand::SetLimit(limit) => self.options.limit = limit.filter(|l| *l > 0),
            ViewCommand::CycleSort => self.options.sort = self.options.sort.next(),
            // interval lives in the clock; the frame status carries it
            ViewCommand::SetInterval(_) => {}
        }
    }

    fn render(&mut self, snapshot: &Snapshot, status: FrameStatus, out: &mut dyn Write) -> Result<()> {
        write!(out, "{}", self.options.format.frame_prefix())?;

        let states = snapshot
            .state_counts()
            .iter()
            .map(|(state, n)| format!("{}: {}", state.label(), n))
            .collect::<Vec<_>>()
            .join(", ");
        self.write_line(
            out,
            format!(
                " PID: {} - {} - {}, threads: {} ({})",
                snapshot.pid,
                snapshot.taken_at.format("%H:%M:%S"),
                snapshot.process_name,
                snapshot.threads.len(),
                states
            ),
            Style::Bold,
        )?;
        self.write_line(
            out,
            format!(
                " CPU: {:.2}%  RSS: {}  VIRT: {}  SWAP: {}",
                snapshot.process_cpu_percent,
                format_kb(snapshot.memory.rss_kb),
                format_kb(snapshot.memory.virtual_kb),
                format_kb(snapshot.memory.swap_kb)
            ),
            Style::Plain,
        )?;
        writeln!(out)?;

        let (threads, matched) = self.visible(snapshot);
        self.write_line(
            out,
            format!(
                " {:>8} {:<width$} {:<8} {:>8} {:>8} {:>9} {:>9}",
                "TID",
                "NAME",
                "STATE",
                "CPU",
                "SYSCPU",
                "TOTAL",
                "TOTALSYS",
                width = NAME_WIDTH
            ),
            Style::Bold,
        )?;

        for thread in &threads {
            let style = if thread.cpu_percent >= HOT_CPU_PERCENT {
                Style::Hot
            } else if thread.cpu_percent >= WARM_CPU_PERCENT {
                Style::Warm
            } else if thread.state == ThreadState::Zombie {
                Style::Dim
            } else {
                Style::Plain
            };
            self.write_line(
                out,
                format!(
                    " {:>8} {:<width$} {:<8} {:>7.2}% {:>7.2}% {:>9} {:>9}",
                    thread.tid,
                    truncate_name(&thread.name),
                    thread.state.label(),
                    thread.cpu_percent,
                    thread.sys_percent,
                    format_ms(thread.total_cpu_ms()),
                    format_ms(thread.total_sys_ms),
                    width = NAME_WIDTH
                ),
                style,
            )?;
        }

        writeln!(out)?;
        let mut footer = format!(
            " Showing {} of {} threads, sorted by {}",
            threads.len(),
            snapshot.threads.len(),
            self.options.sort.name()
        );
        if let Some(filter) = &self.options.filter {
            footer.push_str(&format!(", name filter \"{}\" matched {}", filter, matched));
        }
        self.write_line(out, footer, Style::Plain)?;

        if self.options.show_hints {
            self.write_line(
                out,
                format!(
                    " Input command (h:help), refresh every {}s, frame #{}",
                    status.interval,
                    status.iteration + 1
                ),
                Style::Dim,
            )?;
        }
        Ok(())
    }
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH {
        name.to_string()
    } else {
        let mut short: String = name.chars().take(NAME_WIDTH - 1).collect();
        short.push('~');
        short
    }
}

/// Human-readable size from kilobytes
pub fn format_kb(kb: u64) -> String {
    const MB: u64 = 1024;
    const GB: u64 = 1024 * 1024;
    if kb >= GB {
        format!("{:.2}g", kb as f64 / GB as f64)
    } else if kb >= MB {
        format!("{:.2}m", kb as f64 / MB as f64)
    } else {
        format!("{}k", kb)
    }
}

/// Human-readable duration from milliseconds
pub fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:02}s", secs, (ms % 1000) / 10)
    }
}

//! Sampling of the monitored process
//!
//! A [`Sampler`] produces one [`Snapshot`] per refresh cycle. The shipped
//! implementation reads Linux procfs; tests substitute their own.

pub mod parse;
pub mod procfs;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::Result;

pub use procfs::ProcSampler;

/// Scheduler state of a thread, as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Idle,
    Other(char),
}

impl ThreadState {
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' | 't' => Self::Stopped,
            'Z' | 'X' => Self::Zombie,
            'I' => Self::Idle,
            other => Self::Other(other),
        }
    }

    /// Short label for the state column
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Sleeping => "SLEEPING",
            Self::DiskSleep => "IO_WAIT",
            Self::Stopped => "STOPPED",
            Self::Zombie => "ZOMBIE",
            Self::Idle => "IDLE",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

/// One thread at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSample {
    pub tid: u32,
    pub name: String,
    pub state: ThreadState,
    /// User CPU time since the thread started, in milliseconds
    pub total_user_ms: u64,
    /// System CPU time since the thread started, in milliseconds
    pub total_sys_ms: u64,
    /// User CPU time spent since the previous sample
    pub user_ms: u64,
    /// System CPU time spent since the previous sample
    pub sys_ms: u64,
    /// Share of one CPU used since the previous sample (0.0 on the first sample)
    pub cpu_percent: f64,
    /// System share of one CPU used since the previous sample
    pub sys_percent: f64,
}

impl ThreadSample {
    pub fn total_cpu_ms(&self) -> u64 {
        self.total_user_ms + self.total_sys_ms
    }

    pub fn cpu_ms(&self) -> u64 {
        self.user_ms + self.sys_ms
    }
}

/// Memory figures for the whole process, in kilobytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub rss_kb: u64,
    pub virtual_kb: u64,
    pub swap_kb: u64,
}

/// Everything observed about the process in one cycle
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub pid: u32,
    pub process_name: String,
    pub taken_at: DateTime<Local>,
    pub memory: MemoryUsage,
    pub threads: Vec<ThreadSample>,
    /// Process-wide share of one CPU since the previous sample
    pub process_cpu_percent: f64,
    /// Wall time covered by the deltas, in milliseconds (0 on the first sample)
    pub window_ms: u64,
}

impl Snapshot {
    /// Number of threads in each state, in first-seen order
    pub fn state_counts(&self) -> Vec<(ThreadState, usize)> {
        let mut counts: Vec<(ThreadState, usize)> = Vec::new();
        for thread in &self.threads {
            match counts.iter_mut().find(|(state, _)| *state == thread.state) {
                Some((_, n)) => *n += 1,
                None => counts.push((thread.state, 1)),
            }
        }
        counts
    }
}

/// Produces snapshots of an attached process
#[async_trait]
pub trait Sampler: Send {
    /// Id of the attached process
    fn pid(&self) -> u32;

    /// Take a snapshot of the process now
    async fn sample(&mut self) -> Result<Snapshot>;
}

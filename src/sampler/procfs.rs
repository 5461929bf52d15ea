//! procfs-backed sampler
//!
//! Reads `<root>/<pid>/status` for memory and `<root>/<pid>/task/*/stat` for
//! per-thread CPU time. CPU percentages are deltas against the previous
//! sample, so the first snapshot reports zero usage.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Local;
use log::{debug, warn};

use crate::error::{Result, StackTopError};
use crate::sampler::parse::{TaskStat, parse_task_stat, status_kb, status_name, ticks_to_ms};
use crate::sampler::{MemoryUsage, Sampler, Snapshot, ThreadSample, ThreadState};

/// CPU ticks observed for one thread on the previous sample
#[derive(Debug, Clone, Copy)]
struct PrevTicks {
    utime: u64,
    stime: u64,
}

/// Sampler attached to one process through procfs
#[derive(Debug)]
pub struct ProcSampler {
    root: PathBuf,
    pid: u32,
    process_name: String,
    prev: HashMap<u32, PrevTicks>,
    prev_at: Option<Instant>,
}

impl ProcSampler {
    /// Attach to `pid` under the procfs mounted at `root`.
    ///
    /// Fails with `RuntimeMissing` when `root` is not a procfs mount and with
    /// `AttachFailed` when the process does not exist or cannot be read.
    pub fn attach(root: impl Into<PathBuf>, pid: u32) -> Result<Self> {
        let root = root.into();
        check_procfs(&root)?;

        let proc_dir = root.join(pid.to_string());
        let status = fs::read_to_string(proc_dir.join("status")).map_err(|e| attach_error(pid, &e))?;
        fs::read_dir(proc_dir.join("task")).map_err(|e| attach_error(pid, &e))?;

        let process_name = status_name(&status).unwrap_or_else(|| pid.to_string());
        debug!("Attached to {} ({}) under {}", pid, process_name, root.display());

        Ok(Self {
            root,
            pid,
            process_name,
            prev: HashMap::new(),
            prev_at: None,
        })
    }

    fn proc_dir(&self) -> PathBuf {
        self.root.join(self.pid.to_string())
    }

    fn read_memory(&self) -> Result<MemoryUsage> {
        let status = fs::read_to_string(self.proc_dir().join("status")).map_err(|e| self.gone(e))?;
        Ok(MemoryUsage {
            rss_kb: status_kb(&status, "VmRSS").unwrap_or(0),
            virtual_kb: status_kb(&status, "VmSize").unwrap_or(0),
            swap_kb: status_kb(&status, "VmSwap").unwrap_or(0),
        })
    }

    fn read_threads(&self) -> Result<Vec<TaskStat>> {
        let task_dir = self.proc_dir().join("task");
        let entries = fs::read_dir(&task_dir).map_err(|e| self.gone(e))?;

        let mut threads = Vec::new();
        for entry in entries {
            let entry = entry?;
            let stat_path = entry.path().join("stat");
            // threads may exit between listing and reading
            let line = match fs::read_to_string(&stat_path) {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", stat_path.display(), e);
                    continue;
                }
            };
            match parse_task_stat(line.trim_end()) {
                Ok(stat) => threads.push(stat),
                Err(e) => warn!("Skipping {}: {}", stat_path.display(), e),
            }
        }
        Ok(threads)
    }

    /// Map a read failure during sampling to the right error kind
    fn gone(&self, err: io::Error) -> StackTopError {
        if check_procfs(&self.root).is_err() {
            StackTopError::RuntimeMissing(format!("procfs at {} is no longer readable", self.root.display()))
        } else if err.kind() == io::ErrorKind::NotFound {
            StackTopError::Sample(format!("process {} has exited", self.pid))
        } else {
            StackTopError::Io(err)
        }
    }
}

#[async_trait]
impl Sampler for ProcSampler {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn sample(&mut self) -> Result<Snapshot> {
        let memory = self.read_memory()?;
        let raw = self.read_threads()?;
        let now = Instant::now();
        let window_ms = self
            .prev_at
            .map(|at| now.duration_since(at).as_millis() as u64)
            .unwrap_or(0);

        let percent = |ms: u64| -> f64 {
            if window_ms == 0 {
                0.0
            } else {
                ms as f64 * 100.0 / window_ms as f64
            }
        };

        let mut next = HashMap::with_capacity(raw.len());
        let mut threads = Vec::with_capacity(raw.len());
        let mut process_ms = 0;
        for stat in raw {
            let (tid, utime, stime) = (stat.tid, stat.utime_ticks, stat.stime_ticks);
            let (user_ms, sys_ms) = match (self.prev_at, self.prev.get(&tid)) {
                (Some(_), Some(prev)) => (
                    ticks_to_ms(utime.saturating_sub(prev.utime)),
                    ticks_to_ms(stime.saturating_sub(prev.stime)),
                ),
                // new thread: everything it used happened inside this window
                (Some(_), None) => (ticks_to_ms(utime), ticks_to_ms(stime)),
                (None, _) => (0, 0),
            };
            process_ms += user_ms + sys_ms;
            next.insert(tid, PrevTicks { utime, stime });
            threads.push(ThreadSample {
                tid,
                name: stat.comm,
                state: ThreadState::from_code(stat.state),
                total_user_ms: ticks_to_ms(utime),
                total_sys_ms: ticks_to_ms(stime),
                user_ms,
                sys_ms,
                cpu_percent: percent(user_ms + sys_ms),
                sys_percent: percent(sys_ms),
            });
        }

        self.prev = next;
        self.prev_at = Some(now);

        Ok(Snapshot {
            pid: self.pid,
            process_name: self.process_name.clone(),
            taken_at: Local::now(),
            memory,
            threads,
            process_cpu_percent: percent(process_ms),
            window_ms,
        })
    }
}

/// Verify `root` looks like a procfs mount
fn check_procfs(root: &Path) -> Result<()> {
    if root.join("stat").is_file() {
        Ok(())
    } else {
        Err(StackTopError::RuntimeMissing(format!(
            "{} is not a procfs mount (no {}/stat)",
            root.display(),
            root.display()
        )))
    }
}

fn attach_error(pid: u32, err: &io::Error) -> StackTopError {
    let reason = match err.kind() {
        io::ErrorKind::NotFound => "no such process".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied (run as the process owner or root)".to_string(),
        _ => err.to_string(),
    };
    StackTopError::AttachFailed { pid, reason }
}

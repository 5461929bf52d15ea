//! Parsers for the procfs files the sampler reads.

use crate::error::{Result, StackTopError};

/// Kernel clock ticks per second (`sysconf(_SC_CLK_TCK)`); 100 on every
/// mainstream Linux configuration.
pub const USER_HZ: u64 = 100;

/// Convert clock ticks to milliseconds
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / USER_HZ
}

/// Fields of `/proc/<pid>/task/<tid>/stat` the monitor cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStat {
    pub tid: u32,
    pub comm: String,
    pub state: char,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
}

/// Parse a `stat` line.
///
/// The command name is wrapped in parentheses and may itself contain spaces
/// and parentheses, so fields are split after the *last* `)`.
pub fn parse_task_stat(line: &str) -> Result<TaskStat> {
    let open = line
        .find('(')
        .ok_or_else(|| StackTopError::Sample(format!("stat line without comm: {:?}", line)))?;
    let close = line
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(|| StackTopError::Sample(format!("stat line without comm: {:?}", line)))?;

    let tid = line[..open]
        .trim()
        .parse::<u32>()
        .map_err(|_| StackTopError::Sample(format!("bad tid in stat line: {:?}", line)))?;
    let comm = line[open + 1..close].to_string();

    let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();
    // rest[0] is field 3 (state); utime and stime are fields 14 and 15
    if rest.len() < 13 {
        return Err(StackTopError::Sample(format!("truncated stat line: {:?}", line)));
    }
    let state = rest[0].chars().next().unwrap_or('?');
    let field = |idx: usize| -> Result<u64> {
        rest[idx]
            .parse::<u64>()
            .map_err(|_| StackTopError::Sample(format!("bad stat field {}: {:?}", idx + 3, rest[idx])))
    };

    Ok(TaskStat {
        tid,
        comm,
        state,
        utime_ticks: field(11)?,
        stime_ticks: field(12)?,
    })
}

/// Look up a `kB` value such as `VmRSS:  1234 kB` in a `status` file
pub fn status_kb(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        value.split_whitespace().next()?.parse().ok()
    })
}

/// Look up the `Name:` line in a `status` file
pub fn status_name(status: &str) -> Option<String> {
    status.lines().find_map(|line| {
        line.strip_prefix("Name:").map(|name| name.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "4242 (java) S 1 4242 4242 0 -1 4194560 1530 0 0 0 250 37 0 0 20 0 31 0 8811 5718368256 53248 18446744073709551615 1 1 0 0 0 0 0 2 16800975 0 0 0 17 3 0 0 0 0 0";

    #[test]
    fn test_parse_task_stat() {
        let stat = parse_task_stat(STAT).unwrap();
        assert_eq!(stat.tid, 4242);
        assert_eq!(stat.comm, "java");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.utime_ticks, 250);
        assert_eq!(stat.stime_ticks, 37);
    }

    #[test]
    fn test_comm_with_spaces_and_parens() {
        let line = "17 (GC (Thread) #1) R 1 17 17 0 -1 0 0 0 0 0 9 4 0 0 20 0 1 0 100 0 0";
        let stat = parse_task_stat(line).unwrap();
        assert_eq!(stat.comm, "GC (Thread) #1");
        assert_eq!(stat.state, 'R');
        assert_eq!(stat.utime_ticks, 9);
        assert_eq!(stat.stime_ticks, 4);
    }

    #[test]
    fn test_truncated_stat_rejected() {
        assert!(parse_task_stat("17 (x) R 1 2 3").is_err());
        assert!(parse_task_stat("garbage").is_err());
        assert!(parse_task_stat("abc (x) R 1 17 17 0 -1 0 0 0 0 0 9 4 0").is_err());
    }

    #[test]
    fn test_ticks_to_ms() {
        assert_eq!(ticks_to_ms(0), 0);
        assert_eq!(ticks_to_ms(1), 10);
        assert_eq!(ticks_to_ms(250), 2500);
    }

    #[test]
    fn test_status_fields() {
        let status = "Name:\tjava\nState:\tS (sleeping)\nVmSize:\t 5584344 kB\nVmRSS:\t   52000 kB\nThreads:\t31\n";
        assert_eq!(status_kb(status, "VmRSS"), Some(52000));
        assert_eq!(status_kb(status, "VmSize"), Some(5584344));
        assert_eq!(status_kb(status, "VmSwap"), None);
        assert_eq!(status_name(status), Some("java".to_string()));
    }
}

//! Process and system statistics read from procfs.
//!
//! Parsing is separated from file access so it can be tested against fixed
//! text, and [`ProcFs`] takes a root directory so tests can point it at a
//! fixture tree.

use std::io;
use std::path::{Path, PathBuf};

/// Kernel clock ticks per second as exposed to userspace (`USER_HZ`).
pub const USER_HZ: f64 = 100.0;

/// Resolution of `/proc/uptime`, in seconds.
pub const UPTIME_GRANULARITY: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn read(&self, relative: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(relative))
    }

    /// User plus system CPU seconds consumed by this process.
    pub fn process_cpu_time(&self) -> io::Result<f64> {
        parse_cpu_time(&self.read("self/stat")?)
    }

    /// CPU seconds consumed by the calling thread.
    pub fn thread_cpu_time(&self) -> io::Result<f64> {
        parse_cpu_time(&self.read("thread-self/stat")?)
    }

    /// Resident set size in bytes.
    pub fn process_rss(&self) -> io::Result<u64> {
        parse_rss(&self.read("self/status")?)
    }

    /// Seconds since boot.
    pub fn system_uptime(&self) -> io::Result<f64> {
        parse_uptime(&self.read("uptime")?)
    }

    /// Number of threads on the system.
    pub fn system_thread_count(&self) -> io::Result<u64> {
        parse_thread_count(&self.read("loadavg")?)
    }

    /// Names of the network interfaces the kernel knows about.
    pub fn available_interfaces(&self) -> io::Result<Vec<String>> {
        Ok(parse_interfaces(&self.read("net/dev")?))
    }
}

fn malformed(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed {}", what))
}

/// `utime + stime` from a `stat` line, in seconds.
///
/// The command name (field 2) may contain spaces and parentheses, so fields
/// are counted from the last `)`.
pub fn parse_cpu_time(stat: &str) -> io::Result<f64> {
    let after_comm = stat
        .rfind(')')
        .map(|idx| &stat[idx + 1..])
        .ok_or_else(|| malformed("stat"))?;
    // After the command name: state is field 3, utime 14, stime 15.
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    let ticks = |index: usize| -> io::Result<u64> {
        fields
            .get(index)
            .and_then(|field| field.parse().ok())
            .ok_or_else(|| malformed("stat"))
    };
    let total = ticks(11)? + ticks(12)?;
    Ok(total as f64 / USER_HZ)
}

pub fn parse_rss(status: &str) -> io::Result<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .ok_or_else(|| malformed("status"))
}

pub fn parse_uptime(uptime: &str) -> io::Result<f64> {
    uptime
        .split_whitespace()
        .next()
        .and_then(|seconds| seconds.parse().ok())
        .ok_or_else(|| malformed("uptime"))
}

/// Total scheduling entities from the `running/total` field of `loadavg`.
pub fn parse_thread_count(loadavg: &str) -> io::Result<u64> {
    loadavg
        .split_whitespace()
        .nth(3)
        .and_then(|field| field.split_once('/'))
        .and_then(|(_, total)| total.parse().ok())
        .ok_or_else(|| malformed("loadavg"))
}

pub fn parse_interfaces(net_dev: &str) -> Vec<String> {
    net_dev
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.trim().to_string())
        .filter(|name| !name.is_empty() && !name.contains('|'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (my (odd) proc) S 1 1234 1234 0 -1 4194560 500 0 0 0 250 50 0 0 20 0 3 0 100 1000 200";

    #[test]
    fn cpu_time_skips_command_name() {
        assert_eq!(parse_cpu_time(STAT).unwrap(), 3.0);
        assert!(parse_cpu_time("garbage").is_err());
    }

    #[test]
    fn rss_is_reported_in_bytes() {
        let status = "Name:\tx\nVmPeak:\t 9000 kB\nVmRSS:\t    2048 kB\n";
        assert_eq!(parse_rss(status).unwrap(), 2048 * 1024);
    }

    #[test]
    fn uptime_and_thread_count() {
        assert_eq!(parse_uptime("350735.47 234388.90\n").unwrap(), 350735.47);
        assert_eq!(parse_thread_count("0.20 0.18 0.12 1/80 11206\n").unwrap(), 80);
    }

    #[test]
    fn interfaces_skip_headers() {
        let net_dev = "Inter-|   Receive\n face |bytes packets\n    lo: 100 1 0\n  eth0: 200 2 0\n";
        assert_eq!(parse_interfaces(net_dev), vec!["lo".to_string(), "eth0".to_string()]);
    }

    #[test]
    fn procfs_reads_from_its_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("uptime"), "12.50 3.00\n").expect("write fixture");
        std::fs::write(dir.path().join("loadavg"), "0 0 0 2/7 1\n").expect("write fixture");
        let procfs = ProcFs::new(dir.path());
        assert_eq!(procfs.system_uptime().unwrap(), 12.5);
        assert_eq!(procfs.system_thread_count().unwrap(), 7);
        assert!(procfs.process_rss().is_err());
    }
}

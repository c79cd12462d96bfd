//! Process memory sampling

use std::fmt::Debug;

use serde::Serialize;

/// Point-in-time process memory reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    /// Resident set size in bytes, `None` when the platform gives no reading
    pub resident_bytes: Option<u64>,
}

impl MemorySnapshot {
    /// Signed change from `earlier` to `self`, when both readings exist
    pub fn delta_since(&self, earlier: &MemorySnapshot) -> Option<i64> {
        match (self.resident_bytes, earlier.resident_bytes) {
            (Some(now), Some(before)) => Some(now as i64 - before as i64),
            _ => None,
        }
    }
}

/// Source of memory snapshots
pub trait MemoryProbe: Send + Sync + Debug {
    fn snapshot(&self) -> MemorySnapshot;
}

/// Reads the resident set size from the `VmRSS` line of `/proc/self/status`
///
/// The kernel reports that line in kB, so the reading does not depend on the
/// page size. Reports no reading on platforms without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn snapshot(&self) -> MemorySnapshot {
        let resident_bytes = std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| parse_vm_rss(&status));

        MemorySnapshot { resident_bytes }
    }
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let rest = status.lines().find_map(|line| line.strip_prefix("VmRSS:"))?;
    let mut fields = rest.split_whitespace();

    let value = fields.next()?.parse::<u64>().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tmathmark\nVmPeak:\t  900000 kB\nVmRSS:\t   51200 kB\nThreads:\t8\n";
        assert_eq!(parse_vm_rss(status), Some(51_200 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_missing_or_malformed() {
        assert_eq!(parse_vm_rss("Name:\tmathmark\n"), None);
        assert_eq!(parse_vm_rss("VmRSS:\tlots kB\n"), None);
        assert_eq!(parse_vm_rss("VmRSS:\t12 MB\n"), None);
    }

    #[test]
    fn test_delta_since() {
        let before = MemorySnapshot {
            resident_bytes: Some(1000),
        };
        let after = MemorySnapshot {
            resident_bytes: Some(400),
        };

        assert_eq!(after.delta_since(&before), Some(-600));
        assert_eq!(MemorySnapshot::default().delta_since(&before), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_probe_reads_procfs() {
        let snapshot = ProcessMemoryProbe.snapshot();
        assert!(snapshot.resident_bytes.unwrap_or(0) > 0);
    }
}

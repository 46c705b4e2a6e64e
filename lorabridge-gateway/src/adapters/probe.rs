//! Free memory from `/proc/meminfo`.

use lorabridge::ResourceProbe;
use std::path::PathBuf;

/// Reads `MemAvailable`, reporting 0 where the file is absent
#[derive(Debug, Clone)]
pub struct ProcProbe {
    path: PathBuf,
}

impl ProcProbe {
    /// Probe of the host's `/proc/meminfo`
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
        }
    }
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ProcProbe {
    fn free_memory(&self) -> u64 {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| parse_mem_available(&text))
            .unwrap_or(0)
    }
}

/// `MemAvailable` in bytes
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mem_available() {
        let meminfo = "MemTotal:       16314328 kB\nMemFree:         1022044 kB\nMemAvailable:    9120400 kB\n";
        assert_eq!(parse_mem_available(meminfo), Some(9_120_400 * 1024));
        assert_eq!(parse_mem_available("MemTotal: 1 kB\n"), None);
    }

    #[test]
    fn test_missing_file_reports_zero() {
        let probe = ProcProbe {
            path: PathBuf::from("/nonexistent/meminfo"),
        };
        assert_eq!(probe.free_memory(), 0);
    }
}

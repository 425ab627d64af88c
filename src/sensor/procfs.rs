//! Parsers for the `/proc` files the sensors read.
//!
//! All parsers take the file contents as a string so they can be unit
//! tested without touching the filesystem.

/// Error type for malformed `/proc` contents.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Aggregate CPU tick counters from the `cpu` line of `/proc/stat`.
///
/// Counters are cumulative since boot; utilization is a delta between two
/// readings (busy delta over total delta).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTicks {
    pub busy: u64,
    pub idle: u64,
}

impl CpuTicks {
    /// Total ticks (busy + idle).
    pub fn total(&self) -> u64 {
        self.busy + self.idle
    }

    /// Utilization in [0, 100] from the delta against a previous reading.
    /// Returns 0.0 when no time has elapsed or the counters went backwards.
    pub fn percent_since(&self, prev: &CpuTicks) -> f64 {
        let total = self.total().saturating_sub(prev.total());
        let busy = self.busy.saturating_sub(prev.busy);
        if total == 0 {
            return 0.0;
        }
        (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Utilization in [0, 100] over the whole uptime (no previous reading).
    pub fn percent_since_boot(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Busy = user + nice + system + irq + softirq + steal; idle = idle + iowait.
pub fn parse_stat_cpu(content: &str) -> Result<CpuTicks, ParseError> {
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"cpu") {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        if parts.len() < 5 {
            return Err(ParseError::new("cpu line has too few fields"));
        }

        let user = get_val(1);
        let nice = get_val(2);
        let system = get_val(3);
        let idle = get_val(4);
        let iowait = get_val(5);
        let irq = get_val(6);
        let softirq = get_val(7);
        let steal = get_val(8);

        return Ok(CpuTicks {
            busy: user + nice + system + irq + softirq + steal,
            idle: idle + iowait,
        });
    }

    Err(ParseError::new("no aggregate cpu line in /proc/stat"))
}

/// Memory figures from `/proc/meminfo` (in kB, as the kernel reports them).
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemInfo {
    /// Utilization in [0, 100]: (total - available) / total.
    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        (used as f64 / self.total_kb as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Parses `MemTotal` and `MemAvailable` from `/proc/meminfo`.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.total_kb = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.available_kb = parse_kb(line);
        }
    }

    if info.total_kb == 0 {
        return Err(ParseError::new("MemTotal missing from /proc/meminfo"));
    }

    Ok(info)
}

/// Cumulative disk byte counters summed over physical devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskTotals {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Bytes per sector in `/proc/diskstats`. The kernel always reports sector
/// counts in 512-byte units regardless of the device's physical sector size.
const SECTOR_BYTES: u64 = 512;

/// Parses `/proc/diskstats`, summing sectors read/written across physical
/// whole-disk devices. Partitions and virtual devices are skipped so bytes
/// are not double counted.
pub fn parse_diskstats(content: &str) -> Result<DiskTotals, ParseError> {
    let mut totals = DiskTotals::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed lines
        }

        let device = parts[2];
        if !is_physical_disk(device) {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        let read_sectors = get_val(5);
        let write_sectors = get_val(9);

        totals.read_bytes += read_sectors * SECTOR_BYTES;
        totals.write_bytes += write_sectors * SECTOR_BYTES;
    }

    Ok(totals)
}

/// Returns true for whole-disk physical devices (`sda`, `nvme0n1`,
/// `mmcblk0`, `vda`, ...), false for partitions and virtual devices
/// (`loop0`, `ram0`, `dm-0`, `sda1`, `nvme0n1p2`, ...).
pub fn is_physical_disk(name: &str) -> bool {
    const VIRTUAL_PREFIXES: &[&str] = &["loop", "ram", "zram", "dm-", "sr", "fd", "md"];
    if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }

    // nvme0n1p1 / mmcblk0p1 are partitions of nvme0n1 / mmcblk0.
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        return !name.contains('p');
    }

    // sda1 / vdb2 / xvda3 are partitions; whole disks end in a letter.
    !name.ends_with(|c: char| c.is_ascii_digit())
}

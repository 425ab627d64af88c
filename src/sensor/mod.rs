//! Host metric acquisition.
//!
//! `MetricSource` wraps the OS sensor reads behind one `acquire()` call:
//! CPU and RAM utilization and disk throughput from `/proc`, GPU
//! utilization from DRM sysfs. All retained state (previous CPU tick
//! counters, previous disk byte counters, the discovered GPU path) lives on
//! the instance, so independent instances never interfere.

pub mod gpu;
mod mock;
pub mod procfs;
mod traits;

pub use mock::MockFs;
pub use traits::{FileSystem, RealFs};

use std::collections::VecDeque;
use std::io;
use std::path::Path;

use gpu::GpuProbe;
use procfs::{CpuTicks, DiskTotals, parse_diskstats, parse_meminfo, parse_stat_cpu};

/// Number of recent CPU readings averaged into the reported value.
/// Smooths the jitter of 1-second sampling without hiding trends.
const CPU_SMOOTH_WINDOW: usize = 8;

/// Acquisition failure: a `/proc` file the sample cannot do without was
/// unreadable or malformed. The caller skips the whole cycle.
///
/// Per-metric unavailability (no GPU) is not an error; the field is simply
/// absent from the reading.
#[derive(Debug)]
pub enum SensorError {
    /// I/O error reading a sensor file.
    Io { path: String, source: io::Error },
    /// A sensor file existed but could not be parsed.
    Parse { path: String, message: String },
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::Io { path, source } => write!(f, "cannot read {}: {}", path, source),
            SensorError::Parse { path, message } => write!(f, "cannot parse {}: {}", path, message),
        }
    }
}

impl std::error::Error for SensorError {}

/// One acquisition result. Timestamping is the collector loop's job, so a
/// reading carries only the measured values.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub gpu_percent: Option<f64>,
    pub disk_read_bps: f64,
    pub disk_write_bps: f64,
}

/// Reads host metrics through a `FileSystem` implementation.
///
/// Disk throughput is a derived rate and needs one prior observation; the
/// first `acquire()` after construction reports the `0.0` sentinel for both
/// rates. CPU utilization is also delta-based but the since-boot totals
/// give a well-defined first value.
pub struct MetricSource<F: FileSystem> {
    fs: F,
    proc_path: String,
    gpu: GpuProbe,
    prev_cpu: Option<CpuTicks>,
    cpu_window: VecDeque<f64>,
    prev_disk: Option<(DiskTotals, i64)>,
}

impl<F: FileSystem> MetricSource<F> {
    /// Creates a metric source reading from `proc_path` (normally `/proc`)
    /// and probing for a GPU under `drm_path` (normally `/sys/class/drm`).
    pub fn new(fs: F, proc_path: impl Into<String>, drm_path: &str) -> Self {
        let gpu = GpuProbe::discover(&fs, drm_path);
        Self {
            fs,
            proc_path: proc_path.into(),
            gpu,
            prev_cpu: None,
            cpu_window: VecDeque::with_capacity(CPU_SMOOTH_WINDOW),
            prev_disk: None,
        }
    }

    /// Returns true if a GPU sensor was discovered.
    pub fn gpu_available(&self) -> bool {
        self.gpu.available()
    }

    /// Acquires one reading. `now_ms` is the caller's wall-clock timestamp,
    /// used to compute the elapsed interval for disk rates.
    pub fn acquire(&mut self, now_ms: i64) -> Result<SensorReading, SensorError> {
        let cpu_percent = self.acquire_cpu()?;
        let ram_percent = self.acquire_ram()?;
        let (disk_read_bps, disk_write_bps) = self.acquire_disk(now_ms)?;
        let gpu_percent = self.gpu.read(&self.fs);

        Ok(SensorReading {
            cpu_percent,
            ram_percent,
            gpu_percent,
            disk_read_bps,
            disk_write_bps,
        })
    }

    fn read_proc_file(&self, name: &str) -> Result<String, SensorError> {
        let path = format!("{}/{}", self.proc_path, name);
        self.fs
            .read_to_string(Path::new(&path))
            .map_err(|source| SensorError::Io { path, source })
    }

    fn acquire_cpu(&mut self) -> Result<f64, SensorError> {
        let content = self.read_proc_file("stat")?;
        let ticks = parse_stat_cpu(&content).map_err(|e| SensorError::Parse {
            path: format!("{}/stat", self.proc_path),
            message: e.message,
        })?;

        let raw = match self.prev_cpu {
            Some(prev) => ticks.percent_since(&prev),
            None => ticks.percent_since_boot(),
        };
        self.prev_cpu = Some(ticks);

        if self.cpu_window.len() == CPU_SMOOTH_WINDOW {
            self.cpu_window.pop_front();
        }
        self.cpu_window.push_back(raw);

        let sum: f64 = self.cpu_window.iter().sum();
        Ok(sum / self.cpu_window.len() as f64)
    }

    fn acquire_ram(&self) -> Result<f64, SensorError> {
        let content = self.read_proc_file("meminfo")?;
        let info = parse_meminfo(&content).map_err(|e| SensorError::Parse {
            path: format!("{}/meminfo", self.proc_path),
            message: e.message,
        })?;
        Ok(info.used_percent())
    }

    fn acquire_disk(&mut self, now_ms: i64) -> Result<(f64, f64), SensorError> {
        let content = self.read_proc_file("diskstats")?;
        let totals = parse_diskstats(&content).map_err(|e| SensorError::Parse {
            path: format!("{}/diskstats", self.proc_path),
            message: e.message,
        })?;

        let rates = match self.prev_disk {
            Some((prev, prev_ms)) if now_ms > prev_ms => {
                let elapsed = (now_ms - prev_ms) as f64 / 1000.0;
                let read = totals.read_bytes.saturating_sub(prev.read_bytes) as f64 / elapsed;
                let write = totals.write_bytes.saturating_sub(prev.write_bytes) as f64 / elapsed;
                (read, write)
            }
            // First observation (or a clock that did not advance): the
            // sentinel, never a negative or undefined rate.
            _ => (0.0, 0.0),
        };

        self.prev_disk = Some((totals, now_ms));
        Ok(rates)
    }

    #[cfg(test)]
    pub(crate) fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }
}

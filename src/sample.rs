//! Sample data model.

use serde::{Deserialize, Serialize};

/// One point-in-time measurement of host resources.
///
/// A sample is created once by the collector loop, persisted once, and never
/// updated. `gpu_percent` is `None` when no GPU sensor could be read that
/// cycle; the other fields are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix milliseconds, assigned by the collector loop at acquisition time.
    /// Strictly increasing across the persisted sequence.
    pub timestamp_ms: i64,
    /// Aggregate CPU utilization in [0, 100].
    pub cpu_percent: f64,
    /// RAM utilization in [0, 100].
    pub ram_percent: f64,
    /// GPU utilization in [0, 100], or `None` when no GPU sensor is readable.
    pub gpu_percent: Option<f64>,
    /// Disk read throughput in bytes per second. Never negative.
    pub disk_read_bps: f64,
    /// Disk write throughput in bytes per second. Never negative.
    pub disk_write_bps: f64,
}

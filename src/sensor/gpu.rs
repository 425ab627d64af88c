//! GPU utilization probe over the DRM sysfs interface.
//!
//! Both amdgpu and recent i915 expose a `gpu_busy_percent` file under
//! `/sys/class/drm/card*/device/`. The probe discovers the first readable
//! card at construction time; hosts without a discrete or integrated GPU
//! simply have no such file and report no GPU utilization.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::traits::FileSystem;

/// Locates and reads the `gpu_busy_percent` sysfs file, if any.
#[derive(Debug, Clone, Default)]
pub struct GpuProbe {
    busy_percent_path: Option<PathBuf>,
}

impl GpuProbe {
    /// Scans `drm_path` (normally `/sys/class/drm`) for `card*` entries and
    /// remembers the first one exposing a `gpu_busy_percent` file.
    pub fn discover<F: FileSystem>(fs: &F, drm_path: &str) -> Self {
        let entries = match fs.read_dir(Path::new(drm_path)) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("GPU probe: cannot list {}: {}", drm_path, e);
                return Self::default();
            }
        };

        for entry in entries {
            let name = entry.file_name().and_then(|n| n.to_str()).unwrap_or("");
            // card0, card1, ... but not card0-DP-1 connector entries.
            if !name.starts_with("card") || name.contains('-') {
                continue;
            }

            let candidate = entry.join("device").join("gpu_busy_percent");
            if fs.exists(&candidate) {
                debug!("GPU probe: using {}", candidate.display());
                return Self {
                    busy_percent_path: Some(candidate),
                };
            }
        }

        debug!("GPU probe: no gpu_busy_percent under {}", drm_path);
        Self::default()
    }

    /// Returns true if a GPU sensor was found at discovery time.
    pub fn available(&self) -> bool {
        self.busy_percent_path.is_some()
    }

    /// Reads the current GPU utilization, clamped to [0, 100].
    ///
    /// Returns `None` when no sensor was discovered or the read/parse fails
    /// this cycle; a GPU that vanishes must never abort the rest of the
    /// sample.
    pub fn read<F: FileSystem>(&self, fs: &F) -> Option<f64> {
        let path = self.busy_percent_path.as_ref()?;
        let content = fs.read_to_string(path).ok()?;
        let value: f64 = content.trim().parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(value.clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::MockFs;

    #[test]
    fn discover_finds_card_with_busy_percent() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/class/drm/card0");
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "42\n");

        let probe = GpuProbe::discover(&fs, "/sys/class/drm");
        assert!(probe.available());
        assert_eq!(probe.read(&fs), Some(42.0));
    }

    #[test]
    fn discover_without_gpu_reports_unavailable() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/class/drm");

        let probe = GpuProbe::discover(&fs, "/sys/class/drm");
        assert!(!probe.available());
        assert_eq!(probe.read(&fs), None);
    }

    #[test]
    fn read_clamps_out_of_range_values() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/class/drm/card0");
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "150\n");

        let probe = GpuProbe::discover(&fs, "/sys/class/drm");
        assert_eq!(probe.read(&fs), Some(100.0));
    }

    #[test]
    fn read_tolerates_garbage_content() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/class/drm/card0");
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "N/A\n");

        let probe = GpuProbe::discover(&fs, "/sys/class/drm");
        assert!(probe.available());
        assert_eq!(probe.read(&fs), None);
    }

    #[test]
    fn discover_skips_connector_entries() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/class/drm/card0-DP-1");
        fs.add_dir("/sys/class/drm/card0");
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "3\n");

        let probe = GpuProbe::discover(&fs, "/sys/class/drm");
        assert!(probe.available());
    }
}

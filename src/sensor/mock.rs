//! In-memory mock filesystem for testing sensors without a real `/proc`.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use super::traits::FileSystem;

/// In-memory filesystem for tests and non-Linux development hosts.
///
/// Stores files and directories in memory so sensor code can be exercised
/// against arbitrary `/proc` and `/sys` states.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content. Parent directories are created
    /// automatically.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.directories.insert(path.clone());

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Builds a mock of a typical idle host: 4-core CPU, 16 GiB of RAM about
    /// half used, one SATA disk with a partition, and an integrated GPU at
    /// 7% utilization.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();
        fs.add_file(
            "/proc/stat",
            "cpu  10000 200 5000 80000 1500 0 300 0 0 0\n\
             cpu0 2500 50 1250 20000 375 0 75 0 0 0\n\
             ctxt 123456\n\
             btime 1700000000\n",
        );
        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16384000 kB\n\
             MemFree:         4096000 kB\n\
             MemAvailable:    8192000 kB\n\
             Buffers:          512000 kB\n\
             Cached:          2048000 kB\n",
        );
        fs.add_file(
            "/proc/diskstats",
            "8 0 sda 5000 100 800000 4000 3000 200 400000 6000 0 9000 10000\n\
             8 1 sda1 4900 100 790000 3900 2900 200 390000 5900 0 8800 9800\n\
             7 0 loop0 50 0 400 10 0 0 0 0 0 10 10\n",
        );
        fs.add_dir("/sys/class/drm/card0");
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "7\n");
        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock file not found: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock directory not found: {}", path.display()),
            ));
        }

        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .chain(self.directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_read_and_exists() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 1 kB\n");

        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc")));
        assert!(!fs.exists(Path::new("/proc/stat")));
        assert_eq!(
            fs.read_to_string(Path::new("/proc/meminfo")).unwrap(),
            "MemTotal: 1 kB\n"
        );
    }

    #[test]
    fn mock_fs_read_dir_lists_children() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/class/drm/card0");
        fs.add_dir("/sys/class/drm/card1");

        let entries = fs.read_dir(Path::new("/sys/class/drm")).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&PathBuf::from("/sys/class/drm/card0")));
    }

    #[test]
    fn typical_host_has_all_sensor_files() {
        let fs = MockFs::typical_host();
        assert!(fs.exists(Path::new("/proc/stat")));
        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc/diskstats")));
        assert!(fs.exists(Path::new("/sys/class/drm/card0/device/gpu_busy_percent")));
    }
}

// Temporary sysfs-like cpu tree.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Mimics `/sys/devices/system/cpu` in a temporary directory.
pub struct FakeSysfs {
    dir: TempDir,
}

impl FakeSysfs {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp sysfs root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Adds `cpuN/cpufreq` with the scaling range set to the full range.
    /// Returns the cpufreq directory.
    pub fn add_cpu(&self, cpu: u32, group: Option<&str>, min: u64, max: u64, available: &[u64]) -> PathBuf {
        let dir = self.cpufreq_dir(cpu);
        fs::create_dir_all(&dir).expect("create cpufreq dir");
        write(&dir, "cpuinfo_min_freq", &min.to_string());
        write(&dir, "cpuinfo_max_freq", &max.to_string());
        write(&dir, "scaling_min_freq", &min.to_string());
        write(&dir, "scaling_max_freq", &max.to_string());
        if let Some(group) = group {
            write(&dir, "freqdomain_cpus", group);
        }
        if !available.is_empty() {
            let list: Vec<String> = available.iter().map(u64::to_string).collect();
            write(&dir, "scaling_available_frequencies", &format!("{} ", list.join(" ")));
        }
        dir
    }

    pub fn add_cpu_without_cpufreq(&self, cpu: u32) {
        fs::create_dir_all(self.root().join(format!("cpu{cpu}"))).expect("create cpu dir");
    }

    pub fn scaling_range(&self, cpu: u32) -> (u64, u64) {
        let dir = self.cpufreq_dir(cpu);
        (read(&dir, "scaling_min_freq"), read(&dir, "scaling_max_freq"))
    }

    fn cpufreq_dir(&self, cpu: u32) -> PathBuf {
        self.root().join(format!("cpu{cpu}")).join("cpufreq")
    }
}

impl Default for FakeSysfs {
    fn default() -> Self {
        Self::new()
    }
}

fn write(dir: &Path, name: &str, value: &str) {
    fs::write(dir.join(name), format!("{value}\n")).expect("write sysfs attribute");
}

fn read(dir: &Path, name: &str) -> u64 {
    fs::read_to_string(dir.join(name))
        .expect("read sysfs attribute")
        .trim()
        .parse()
        .expect("integer sysfs attribute")
}

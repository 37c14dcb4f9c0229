// Frequency scaling domains backed by the Linux cpufreq sysfs interface.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::api::{AvailableRange, PowerControl, PowerDomain};
use super::error::PowerError;
use super::io::{read_int, read_ints, read_optional, write_int};

pub const DEFAULT_ROOT: &str = "/sys/devices/system/cpu";

const CPUFREQ_DIR: &str = "cpufreq";
const FREQDOMAIN_CPUS: &str = "freqdomain_cpus";
const RELATED_CPUS: &str = "related_cpus";
const CPUINFO_MIN: &str = "cpuinfo_min_freq";
const CPUINFO_MAX: &str = "cpuinfo_max_freq";
const AVAILABLE_FREQS: &str = "scaling_available_frequencies";
const SCALING_MIN: &str = "scaling_min_freq";
const SCALING_MAX: &str = "scaling_max_freq";

static CPU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cpu(\d+)$").expect("valid cpu dir regex"));

/// Discovers domains under a sysfs cpu directory.
#[derive(Debug, Clone)]
pub struct SysfsPower {
    root: PathBuf,
}

impl SysfsPower {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// CPU directories ordered by CPU number.
    fn cpus(&self) -> Result<Vec<(u32, PathBuf)>, PowerError> {
        let entries = fs::read_dir(&self.root).map_err(|e| PowerError::io(&self.root, e))?;

        let mut cpus = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PowerError::io(&self.root, e))?;
            let name = entry.file_name();
            let Some(caps) = name.to_str().and_then(|n| CPU_RE.captures(n)) else {
                continue;
            };
            let Ok(num) = caps[1].parse::<u32>() else {
                continue;
            };
            let path = entry.path();
            if path.is_dir() {
                cpus.push((num, path));
            }
        }
        cpus.sort_by_key(|(num, _)| *num);
        Ok(cpus)
    }
}

impl Default for SysfsPower {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl PowerControl for SysfsPower {
    fn domains(&self) -> Result<Vec<Arc<dyn PowerDomain>>, PowerError> {
        let mut domains: Vec<Arc<dyn PowerDomain>> = Vec::new();
        let mut seen = HashSet::new();

        for (num, cpu_dir) in self.cpus()? {
            let dir = cpu_dir.join(CPUFREQ_DIR);
            if !dir.is_dir() {
                debug!(
                    component = "cpupower",
                    event = "no_cpufreq",
                    cpu = num,
                    "cpu has no cpufreq interface, skipping"
                );
                continue;
            }

            // CPUs sharing a domain report the same group; keep the first one.
            let group = match read_optional(&dir.join(FREQDOMAIN_CPUS))? {
                Some(group) => Some(group),
                None => read_optional(&dir.join(RELATED_CPUS))?,
            };
            if let Some(group) = group {
                if !seen.insert(group) {
                    continue;
                }
            }

            let min = read_int(&dir.join(CPUINFO_MIN))?;
            let max = read_int(&dir.join(CPUINFO_MAX))?;
            let mut frequencies = read_ints(&dir.join(AVAILABLE_FREQS))?.unwrap_or_default();
            frequencies.sort_unstable();

            domains.push(Arc::new(SysfsDomain {
                name: format!("cpu{num}"),
                dir,
                available: AvailableRange { min, max, frequencies },
            }));
        }

        Ok(domains)
    }
}

/// One cpufreq policy directory.
#[derive(Debug)]
pub struct SysfsDomain {
    name: String,
    dir: PathBuf,
    available: AvailableRange,
}

impl PowerDomain for SysfsDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_range(&self) -> &AvailableRange {
        &self.available
    }

    fn current_range(&self) -> Result<(u64, u64), PowerError> {
        let min = read_int(&self.dir.join(SCALING_MIN))?;
        let max = read_int(&self.dir.join(SCALING_MAX))?;
        Ok((min, max))
    }

    fn set_range(&self, min: u64, max: u64) -> Result<(), PowerError> {
        // The kernel rejects a write that would leave min above max, so the
        // right order depends on the old range. Write min, then max, and retry
        // min if the first attempt failed.
        let min_path = self.dir.join(SCALING_MIN);
        let first = write_int(&min_path, min);
        write_int(&self.dir.join(SCALING_MAX), max)?;
        if first.is_err() {
            write_int(&min_path, min)?;
        }
        Ok(())
    }
}

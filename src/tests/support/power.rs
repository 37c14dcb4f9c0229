// In-memory power backend for unit tests.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cpupower::{AvailableRange, PowerControl, PowerDomain, PowerError};

/// A domain whose "hardware" is a mutex-protected range.
#[derive(Debug)]
pub struct MemoryDomain {
    name: String,
    available: AvailableRange,
    current: Mutex<(u64, u64)>,
    fail_read: Mutex<bool>,
    fail_write: Mutex<HashSet<(u64, u64)>>,
    writes: Mutex<Vec<(u64, u64)>>,
}

impl MemoryDomain {
    pub fn new(name: &str, min: u64, max: u64, frequencies: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: AvailableRange {
                min,
                max,
                frequencies: frequencies.to_vec(),
            },
            current: Mutex::new((min, max)),
            fail_read: Mutex::new(false),
            fail_write: Mutex::new(HashSet::new()),
            writes: Mutex::new(Vec::new()),
        })
    }

    pub fn current(&self) -> (u64, u64) {
        *self.current.lock()
    }

    pub fn set_current(&self, min: u64, max: u64) {
        *self.current.lock() = (min, max);
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_read.lock() = fail;
    }

    /// Makes writes of exactly this range fail.
    pub fn fail_write_of(&self, min: u64, max: u64) {
        self.fail_write.lock().insert((min, max));
    }

    pub fn writes(&self) -> Vec<(u64, u64)> {
        self.writes.lock().clone()
    }

    fn error(&self, what: &str) -> PowerError {
        PowerError::Io {
            path: PathBuf::from(format!("/fake/{}/{}", self.name, what)),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        }
    }
}

impl PowerDomain for MemoryDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_range(&self) -> &AvailableRange {
        &self.available
    }

    fn current_range(&self) -> Result<(u64, u64), PowerError> {
        if *self.fail_read.lock() {
            return Err(self.error("scaling_min_freq"));
        }
        Ok(self.current())
    }

    fn set_range(&self, min: u64, max: u64) -> Result<(), PowerError> {
        if self.fail_write.lock().contains(&(min, max)) {
            return Err(self.error("scaling_max_freq"));
        }
        self.writes.lock().push((min, max));
        self.set_current(min, max);
        Ok(())
    }
}

/// A fixed set of memory domains.
#[derive(Default)]
pub struct MemoryPower {
    domains: Vec<Arc<MemoryDomain>>,
}

impl MemoryPower {
    pub fn new(domains: Vec<Arc<MemoryDomain>>) -> Arc<Self> {
        Arc::new(Self { domains })
    }
}

impl PowerControl for MemoryPower {
    fn domains(&self) -> Result<Vec<Arc<dyn PowerDomain>>, PowerError> {
        Ok(self
            .domains
            .iter()
            .map(|d| d.clone() as Arc<dyn PowerDomain>)
            .collect())
    }
}

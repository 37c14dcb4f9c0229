// Hardware-control interfaces.

use std::fmt;
use std::sync::Arc;

use super::error::PowerError;

/// Frequencies (kHz) a domain is capable of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableRange {
    pub min: u64,
    pub max: u64,
    /// Discrete selectable frequencies in ascending order, or empty if any
    /// frequency in `min..=max` can be set.
    pub frequencies: Vec<u64>,
}

/// A frequency scaling domain. May cover more than one CPU.
pub trait PowerDomain: Send + Sync + fmt::Debug {
    /// Display name, e.g. `cpu0`.
    fn name(&self) -> &str;

    /// Range the hardware supports.
    fn available_range(&self) -> &AvailableRange;

    /// Range the governor may currently select between.
    fn current_range(&self) -> Result<(u64, u64), PowerError>;

    /// Sets the range the governor may select between.
    fn set_range(&self, min: u64, max: u64) -> Result<(), PowerError>;
}

/// Enumerates the frequency scaling domains of this host.
pub trait PowerControl: Send + Sync {
    fn domains(&self) -> Result<Vec<Arc<dyn PowerDomain>>, PowerError>;
}

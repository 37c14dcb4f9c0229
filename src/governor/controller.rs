// Captures, applies and restores a uniform frequency target.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cpupower::{AvailableRange, PowerControl, PowerDomain, PowerError};

#[derive(Debug, thiserror::Error)]
pub enum GovernorError {
    #[error("governor percent must be between 0 and 100, got {0}")]
    InvalidPercent(i32),
    #[error("no power domains")]
    NoDomains,
    #[error(transparent)]
    Power(#[from] PowerError),
}

/// A domain's range as it was before the override.
struct Saved {
    domain: Arc<dyn PowerDomain>,
    min: u64,
    max: u64,
}

/// Per-session governor override.
///
/// The first successful capture is kept until [`restore`](Self::restore), so
/// repeated targets within one hold always restore to the original ranges.
pub struct GovernorController {
    power: Arc<dyn PowerControl>,
    saved: Vec<Saved>,
}

impl GovernorController {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self {
            power,
            saved: Vec::new(),
        }
    }

    /// Whether an override is active and must be restored.
    pub fn is_active(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Pins every domain to `percent` of the way between its lowest and
    /// highest available frequency.
    ///
    /// Capture is all-or-nothing: if any current range cannot be read, nothing
    /// is written. Apply stops at the first write error; domains changed before
    /// it stay changed until [`restore`](Self::restore).
    pub fn set_target(&mut self, percent: i32) -> Result<(), GovernorError> {
        let Ok(pct) = u64::try_from(percent) else {
            return Err(GovernorError::InvalidPercent(percent));
        };
        if pct > 100 {
            return Err(GovernorError::InvalidPercent(percent));
        }

        let domains = self.power.domains()?;
        if domains.is_empty() {
            return Err(GovernorError::NoDomains);
        }

        let mut captured = Vec::with_capacity(domains.len());
        for domain in &domains {
            let (min, max) = domain.current_range()?;
            captured.push(Saved {
                domain: domain.clone(),
                min,
                max,
            });
        }
        for saved in captured {
            if !self.saved.iter().any(|s| s.domain.name() == saved.domain.name()) {
                self.saved.push(saved);
            }
        }

        for domain in &domains {
            let target = target_frequency(domain.available_range(), pct);
            domain.set_range(target, target)?;
            debug!(
                component = "governor",
                event = "domain_pinned",
                domain = domain.name(),
                khz = target,
                "frequency pinned"
            );
        }

        info!(
            component = "governor",
            event = "override_applied",
            percent,
            domains = domains.len(),
            "governor override applied"
        );
        Ok(())
    }

    /// Puts every captured range back. All domains are attempted; the first
    /// error is returned.
    pub fn restore(&mut self) -> Result<(), GovernorError> {
        let mut first: Option<PowerError> = None;
        let count = self.saved.len();

        for saved in self.saved.drain(..) {
            if let Err(e) = saved.domain.set_range(saved.min, saved.max) {
                warn!(
                    component = "governor",
                    event = "restore_failed",
                    domain = saved.domain.name(),
                    error = %e,
                    "failed to restore frequency range"
                );
                first.get_or_insert(e);
            }
        }

        match first {
            Some(e) => Err(e.into()),
            None => {
                info!(
                    component = "governor",
                    event = "override_restored",
                    domains = count,
                    "governor override restored"
                );
                Ok(())
            }
        }
    }
}

/// Frequency `percent` of the way through `range`, snapped to the nearest
/// discrete frequency if the domain has any. Ties go to the lower frequency.
pub fn target_frequency(range: &AvailableRange, percent: u64) -> u64 {
    let target = range.min + range.max.saturating_sub(range.min) * percent / 100;
    nearest(&range.frequencies, target).unwrap_or(target)
}

fn nearest(frequencies: &[u64], target: u64) -> Option<u64> {
    let mut closest = *frequencies.first()?;
    for &f in frequencies {
        if f.abs_diff(target) < closest.abs_diff(target) {
            closest = f;
        }
    }
    Some(closest)
}

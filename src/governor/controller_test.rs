//! Tests for the governor controller.

#[cfg(test)]
mod tests {
    use crate::cpupower::{AvailableRange, SysfsPower};
    use crate::governor::{target_frequency, GovernorController, GovernorError};
    use crate::support::{FakeSysfs, MemoryDomain, MemoryPower};
    use std::sync::Arc;

    fn range(min: u64, max: u64, frequencies: &[u64]) -> AvailableRange {
        AvailableRange {
            min,
            max,
            frequencies: frequencies.to_vec(),
        }
    }

    #[test]
    fn test_target_frequency_continuous() {
        let r = range(800, 2000, &[]);
        assert_eq!(target_frequency(&r, 0), 800);
        assert_eq!(target_frequency(&r, 50), 1400);
        assert_eq!(target_frequency(&r, 90), 1880);
        assert_eq!(target_frequency(&r, 100), 2000);
    }

    #[test]
    fn test_target_frequency_snaps_with_lower_tie_break() {
        let r = range(800, 2000, &[800, 1200, 1600, 2000]);
        // 1400 is equidistant from 1200 and 1600.
        assert_eq!(target_frequency(&r, 50), 1200);
        assert_eq!(target_frequency(&r, 60), 1600);
        assert_eq!(target_frequency(&r, 0), 800);
        assert_eq!(target_frequency(&r, 100), 2000);
    }

    #[test]
    fn test_set_target_then_restore_exactly() {
        let d = MemoryDomain::new("cpu0", 800, 2000, &[800, 1200, 1600, 2000]);
        let mut gov = GovernorController::new(MemoryPower::new(vec![d.clone()]));

        gov.set_target(50).unwrap();
        assert!(gov.is_active());
        assert_eq!(d.current(), (1200, 1200));

        gov.restore().unwrap();
        assert!(!gov.is_active());
        assert_eq!(d.current(), (800, 2000));
    }

    #[test]
    fn test_repeated_targets_restore_to_first_capture() {
        let d = MemoryDomain::new("cpu0", 800, 2000, &[]);
        d.set_current(1000, 1800);
        let mut gov = GovernorController::new(MemoryPower::new(vec![d.clone()]));

        gov.set_target(10).unwrap();
        gov.set_target(100).unwrap();
        gov.set_target(0).unwrap();
        assert_eq!(d.current(), (800, 800));

        gov.restore().unwrap();
        assert_eq!(d.current(), (1000, 1800));
    }

    #[test]
    fn test_no_domains_is_error() {
        let mut gov = GovernorController::new(MemoryPower::new(vec![]));
        let err = gov.set_target(50).unwrap_err();
        assert!(matches!(err, GovernorError::NoDomains));
        assert_eq!(err.to_string(), "no power domains");
        assert!(!gov.is_active());
    }

    #[test]
    fn test_invalid_percent_changes_nothing() {
        let d = MemoryDomain::new("cpu0", 800, 2000, &[]);
        let mut gov = GovernorController::new(MemoryPower::new(vec![d.clone()]));

        assert!(matches!(gov.set_target(101), Err(GovernorError::InvalidPercent(101))));
        assert!(matches!(gov.set_target(-1), Err(GovernorError::InvalidPercent(-1))));
        assert!(d.writes().is_empty());
        assert!(!gov.is_active());
    }

    #[test]
    fn test_capture_failure_applies_nothing() {
        let a = MemoryDomain::new("cpu0", 800, 2000, &[]);
        let b = MemoryDomain::new("cpu1", 800, 2000, &[]);
        b.fail_reads(true);
        let mut gov = GovernorController::new(MemoryPower::new(vec![a.clone(), b.clone()]));

        assert!(gov.set_target(50).is_err());
        assert!(a.writes().is_empty());
        assert!(b.writes().is_empty());
        assert!(!gov.is_active());
    }

    #[test]
    fn test_apply_stops_at_first_write_error() {
        let a = MemoryDomain::new("cpu0", 800, 2000, &[]);
        let b = MemoryDomain::new("cpu1", 800, 2000, &[]);
        let c = MemoryDomain::new("cpu2", 800, 2000, &[]);
        b.fail_write_of(1400, 1400);
        let mut gov = GovernorController::new(MemoryPower::new(vec![a.clone(), b.clone(), c.clone()]));

        let err = gov.set_target(50).unwrap_err();
        assert!(err.to_string().contains("permission denied"), "{err}");
        assert_eq!(a.current(), (1400, 1400));
        assert_eq!(b.current(), (800, 2000));
        assert!(c.writes().is_empty(), "apply must stop at the failing domain");

        // The partially applied override is still restorable.
        assert!(gov.is_active());
        gov.restore().unwrap();
        assert_eq!(a.current(), (800, 2000));
    }

    #[test]
    fn test_restore_attempts_all_and_reports_first_error() {
        let a = MemoryDomain::new("cpu0", 800, 2000, &[]);
        let b = MemoryDomain::new("cpu1", 800, 2000, &[]);
        let c = MemoryDomain::new("cpu2", 800, 2000, &[]);
        let mut gov = GovernorController::new(MemoryPower::new(vec![a.clone(), b.clone(), c.clone()]));

        gov.set_target(50).unwrap();
        a.fail_write_of(800, 2000);
        b.fail_write_of(800, 2000);

        let err = gov.restore().unwrap_err();
        assert!(err.to_string().contains("/fake/cpu0/"), "{err}");
        assert_eq!(c.current(), (800, 2000), "later domains are still restored");
        assert!(!gov.is_active());
    }

    #[test]
    fn test_restore_without_override_is_noop() {
        let d = MemoryDomain::new("cpu0", 800, 2000, &[]);
        let mut gov = GovernorController::new(MemoryPower::new(vec![d.clone()]));
        gov.restore().unwrap();
        assert!(d.writes().is_empty());
    }

    #[test]
    fn test_sysfs_round_trip() {
        let sysfs = FakeSysfs::new();
        sysfs.add_cpu(0, Some("0"), 800, 2000, &[800, 1200, 1600, 2000]);
        sysfs.add_cpu(1, Some("1"), 1000, 3000, &[]);
        let mut gov = GovernorController::new(Arc::new(SysfsPower::new(sysfs.root())));

        gov.set_target(50).unwrap();
        assert_eq!(sysfs.scaling_range(0), (1200, 1200));
        assert_eq!(sysfs.scaling_range(1), (2000, 2000));

        gov.restore().unwrap();
        assert_eq!(sysfs.scaling_range(0), (800, 2000));
        assert_eq!(sysfs.scaling_range(1), (1000, 3000));
    }
}

//! The boot validator: runs once early in every boot and decides between
//! confirming the current slot and rolling back to the other one.
//!
//! The state machine is driven entirely by the persisted attempt counter,
//! not by the health probe alone: the counter is incremented and persisted
//! before anything else, the rollback guard fires only when the counter
//! has exceeded the threshold across consecutive boots, and a failed probe
//! below the threshold simply leaves the incremented counter behind for
//! the next boot to act on. A transient network hiccup therefore costs one
//! counted attempt, not a rollback.

use seesaw_error::Result;
use seesaw_state::StateStore;
use seesaw_types::{DeviceLayout, Slot, ValidatorConfig};

use crate::health::HealthProbe;
use crate::host::Host;
use crate::switcher::PartitionSwitcher;

/// What a validator run decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorOutcome {
    /// The slot is confirmed good; its attempt counter was reset to 0.
    Healthy,
    /// The probe failed but the threshold has not been exceeded. The
    /// incremented counter stays; repeated failures will trip rollback.
    FailingForward {
        /// The attempt count recorded this boot.
        attempts: u32,
    },
    /// The threshold was exceeded; the other slot was activated and a
    /// reboot requested.
    RolledBack {
        /// The slot that kept failing.
        from: Slot,
        /// The slot the device will boot next.
        to: Slot,
    },
}

/// Runs the per-boot validation state machine.
pub struct BootValidator<'a, S, H> {
    store: &'a S,
    host: &'a H,
    layout: &'a DeviceLayout,
    config: &'a ValidatorConfig,
}

impl<'a, S: StateStore, H: Host> BootValidator<'a, S, H> {
    /// A validator over the given store, host, layout, and config.
    #[must_use]
    pub fn new(
        store: &'a S,
        host: &'a H,
        layout: &'a DeviceLayout,
        config: &'a ValidatorConfig,
    ) -> Self {
        Self {
            store,
            host,
            layout,
            config,
        }
    }

    /// Run the state machine once.
    ///
    /// Any startup delay is the caller's business; by the time this runs
    /// the system should be as settled as it is going to get.
    pub fn run(&self, probe: &dyn HealthProbe) -> Result<ValidatorOutcome> {
        // Booting -> Validating: record the attempt before any guard, so
        // a crash during validation still counts against this slot.
        let active = self.store.read_active_slot();
        let attempts = self.store.read_attempt_count(active).saturating_add(1);
        self.store.write_attempt_count(active, attempts)?;
        tracing::info!(
            target: "seesaw.validate",
            slot = %active,
            attempts,
            threshold = self.config.failure_threshold,
            "boot attempt recorded"
        );

        // Surfaced for the operator and the logs; never auto-healed.
        if let Err(err) = self.store.check_agreement() {
            tracing::warn!(target: "seesaw.validate", error = %err, "state disagreement");
        }

        // Validating -> RollingBack.
        if attempts > self.config.failure_threshold {
            let to = active.other();
            tracing::warn!(
                target: "seesaw.validate",
                from = %active,
                to = %to,
                attempts,
                "failure threshold exceeded, rolling back"
            );
            PartitionSwitcher::new(self.store, self.host, self.layout).activate(to)?;
            self.host.reboot()?;
            return Ok(ValidatorOutcome::RolledBack { from: active, to });
        }

        // Validating -> Healthy, or stay and let the next boot decide.
        match probe.check() {
            Ok(()) => {
                self.store.write_attempt_count(active, 0)?;
                tracing::info!(
                    target: "seesaw.validate",
                    slot = %active,
                    probe = probe.name(),
                    "boot confirmed healthy"
                );
                Ok(ValidatorOutcome::Healthy)
            }
            Err(reason) => {
                tracing::warn!(
                    target: "seesaw.validate",
                    slot = %active,
                    probe = probe.name(),
                    attempts,
                    reason,
                    "health probe failed, failing forward"
                );
                Ok(ValidatorOutcome::FailingForward { attempts })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::FixedProbe;
    use crate::host::FakeHost;
    use seesaw_state::{marker, FileStateStore};
    use std::fs;

    struct Fixture {
        store: FileStateStore,
        host: FakeHost,
        layout: DeviceLayout,
        config: ValidatorConfig,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = DeviceLayout::rooted_at(dir.path());
        fs::create_dir_all(layout.boot_config.parent().unwrap()).unwrap();
        fs::write(&layout.boot_config, "root=/dev/mmcblk0p3 rootwait\n").unwrap();
        for slot in [Slot::A, Slot::B] {
            marker::write_in_root(
                &layout,
                layout.mount_point(slot),
                &"2024.01.15".parse().unwrap(),
            )
            .unwrap();
        }
        let store = FileStateStore::new(layout.clone());
        store.write_active_slot(Slot::B).unwrap();
        Fixture {
            store,
            host: FakeHost::new(),
            layout,
            config: ValidatorConfig::default(),
            _dir: dir,
        }
    }

    fn validator(f: &Fixture) -> BootValidator<'_, FileStateStore, FakeHost> {
        BootValidator::new(&f.store, &f.host, &f.layout, &f.config)
    }

    #[test]
    fn healthy_boot_resets_counter() {
        let f = fixture();
        f.store.write_attempt_count(Slot::B, 2).unwrap();

        let outcome = validator(&f).run(&FixedProbe::healthy()).unwrap();

        assert_eq!(outcome, ValidatorOutcome::Healthy);
        assert_eq!(f.store.read_attempt_count(Slot::B), 0);
        assert_eq!(f.host.reboot_count(), 0);
    }

    #[test]
    fn failed_probe_below_threshold_fails_forward() {
        let f = fixture();

        let outcome = validator(&f).run(&FixedProbe::unhealthy()).unwrap();

        assert_eq!(outcome, ValidatorOutcome::FailingForward { attempts: 1 });
        assert_eq!(f.store.read_attempt_count(Slot::B), 1);
        assert_eq!(f.store.read_active_slot(), Slot::B);
        assert_eq!(f.host.reboot_count(), 0);
    }

    #[test]
    fn at_threshold_no_rollback_yet() {
        let f = fixture();
        // This run increments 2 -> 3, which equals the threshold.
        f.store.write_attempt_count(Slot::B, 2).unwrap();

        let outcome = validator(&f).run(&FixedProbe::unhealthy()).unwrap();

        assert_eq!(outcome, ValidatorOutcome::FailingForward { attempts: 3 });
        assert_eq!(f.store.read_active_slot(), Slot::B);
    }

    #[test]
    fn beyond_threshold_rolls_back() {
        let f = fixture();
        // This run increments 3 -> 4, exceeding the threshold of 3.
        f.store.write_attempt_count(Slot::B, 3).unwrap();

        let outcome = validator(&f).run(&FixedProbe::unhealthy()).unwrap();

        assert_eq!(
            outcome,
            ValidatorOutcome::RolledBack {
                from: Slot::B,
                to: Slot::A
            }
        );
        assert_eq!(f.store.read_active_slot(), Slot::A);
        assert_eq!(f.store.read_pointer_slot().unwrap(), Some(Slot::A));
        assert_eq!(f.store.read_attempt_count(Slot::A), 0);
        assert_eq!(f.host.reboot_count(), 1);
    }

    #[test]
    fn rollback_fires_even_when_probe_would_pass() {
        // Past the threshold the counter alone decides; a healthy probe
        // this boot does not rescue a slot that failed three times before.
        let f = fixture();
        f.store.write_attempt_count(Slot::B, 3).unwrap();

        let outcome = validator(&f).run(&FixedProbe::healthy()).unwrap();

        assert!(matches!(outcome, ValidatorOutcome::RolledBack { .. }));
    }

    #[test]
    fn repeated_failing_boots_walk_to_rollback() {
        let f = fixture();
        let probe = FixedProbe::unhealthy();

        for expected in 1..=3 {
            let outcome = validator(&f).run(&probe).unwrap();
            assert_eq!(
                outcome,
                ValidatorOutcome::FailingForward { attempts: expected }
            );
        }
        let outcome = validator(&f).run(&probe).unwrap();
        assert_eq!(
            outcome,
            ValidatorOutcome::RolledBack {
                from: Slot::B,
                to: Slot::A
            }
        );
    }

    #[test]
    fn rollback_to_invalid_slot_propagates_error() {
        let f = fixture();
        f.store.write_attempt_count(Slot::B, 3).unwrap();
        f.host.deny_mounts_of(f.layout.device(Slot::A));

        let err = validator(&f).run(&FixedProbe::unhealthy()).unwrap_err();
        assert!(matches!(
            err,
            seesaw_error::SeesawError::InvalidTarget { slot: Slot::A, .. }
        ));
        // The attempt was still recorded; the next boot tries again.
        assert_eq!(f.store.read_attempt_count(Slot::B), 4);
    }
}

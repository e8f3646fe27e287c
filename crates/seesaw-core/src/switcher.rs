//! The partition switcher: the one primitive that flips which slot boots.
//!
//! Both the installer (after populating a new slot) and the boot validator
//! (rolling back a failing one) funnel through [`PartitionSwitcher::activate`].
//! Its step ordering is the crash-safety contract:
//!
//! 1. validate the target slot (mountable, version marker present)
//! 2. stage the target's kernel payload, if it carries one
//! 3. rewrite the boot loader pointer
//! 4. write the active-slot record
//! 5. reset the target's boot attempt counter
//!
//! Step 1 failures abort with nothing touched. After step 1 the switcher
//! presses on past individual failures and reports the first one at the
//! end: a pointer and active-slot record that agree with each other beat a
//! clean abort that leaves them pointing at different slots.

use std::fs;
use std::path::Path;

use seesaw_error::{Result, SeesawError};
use seesaw_state::{marker, StateStore};
use seesaw_types::{DeviceLayout, Slot, SlotReport, SlotSummary, SystemVersion};

use crate::fsutil;
use crate::host::Host;

/// Flips the active slot. See the module docs for the step contract.
pub struct PartitionSwitcher<'a, S, H> {
    store: &'a S,
    host: &'a H,
    layout: &'a DeviceLayout,
}

impl<'a, S: StateStore, H: Host> PartitionSwitcher<'a, S, H> {
    /// A switcher over the given store, host, and layout.
    #[must_use]
    pub fn new(store: &'a S, host: &'a H, layout: &'a DeviceLayout) -> Self {
        Self {
            store,
            host,
            layout,
        }
    }

    /// Make `target` the slot the device boots next.
    ///
    /// Idempotent: activating the already-active slot (with an agreeing
    /// boot pointer) validates it and returns without writing anything.
    pub fn activate(&self, target: Slot) -> Result<()> {
        tracing::info!(target: "seesaw.switch", slot = %target, "activation requested");

        // Step 1: the target must prove it is bootable before any state
        // moves. Mount failures and a missing marker both mean "not a
        // valid target", with everything untouched.
        let device = self.layout.device(target);
        let mount_point = self.layout.mount_point(target);
        self.host
            .mount(device, mount_point, true)
            .map_err(|err| SeesawError::invalid_target(target, err.to_string()))?;

        let version = match marker::read_in_root(self.layout, mount_point) {
            Some(version) => version,
            None => {
                let _ = self.host.unmount(mount_point);
                return Err(SeesawError::invalid_target(
                    target,
                    "missing or unreadable version marker",
                ));
            }
        };
        tracing::info!(
            target: "seesaw.switch",
            slot = %target,
            version = %version,
            "target slot validated"
        );

        if self.store.read_active_slot() == target
            && self.store.read_pointer_slot().ok().flatten() == Some(target)
        {
            let _ = self.host.unmount(mount_point);
            tracing::info!(target: "seesaw.switch", slot = %target, "already active");
            return Ok(());
        }

        let mut first_error: Option<SeesawError> = None;
        let note_failure = |step: &str, err: SeesawError, first: &mut Option<SeesawError>| {
            tracing::error!(
                target: "seesaw.switch",
                slot = %target,
                step,
                error = %err,
                "switch step failed, continuing with remaining steps"
            );
            first.get_or_insert(err);
        };

        // Step 2: hybrid layouts carry the slot's kernel next to its root
        // tree; stage it into the boot area while the slot is mounted.
        if let Err(err) = self.stage_kernel(target, mount_point) {
            note_failure("stage-kernel", err, &mut first_error);
        }
        if let Err(err) = self.host.unmount(mount_point) {
            note_failure("unmount", err, &mut first_error);
        }

        // Steps 3 and 4 are written back to back on purpose: the window in
        // which power loss leaves them disagreeing is the one fault the
        // design cannot self-heal, so it is kept as narrow as possible.
        if let Err(err) = self.store.write_pointer(target) {
            note_failure("write-pointer", err, &mut first_error);
        }
        if let Err(err) = self.store.write_active_slot(target) {
            note_failure("write-active-slot", err, &mut first_error);
        }

        // Step 5: a freshly activated slot starts with a clean record.
        if let Err(err) = self.store.write_attempt_count(target, 0) {
            note_failure("reset-attempts", err, &mut first_error);
        }

        match first_error {
            None => {
                tracing::info!(
                    target: "seesaw.switch",
                    slot = %target,
                    version = %version,
                    "slot activated"
                );
                Ok(())
            }
            Some(err) => Err(err),
        }
    }

    /// Activate the slot the device is not currently running: the rollback
    /// path the validator takes automatically and the operator takes via
    /// `partition-switcher rollback`.
    pub fn rollback(&self) -> Result<()> {
        let active = self.store.read_active_slot();
        tracing::warn!(
            target: "seesaw.switch",
            from = %active,
            to = %active.other(),
            "rolling back"
        );
        self.activate(active.other())
    }

    /// Snapshot both slots for diagnostics. Never fails: unreadable pieces
    /// simply come back as `None`/defaults.
    #[must_use]
    pub fn report(&self) -> SlotReport {
        let active_slot = self.store.read_active_slot();
        let pointer_slot = self.store.read_pointer_slot().ok().flatten();
        SlotReport {
            active_slot,
            pointer_slot,
            disagreement: matches!(pointer_slot, Some(pointer) if pointer != active_slot),
            slot_a: self.summarize(Slot::A, active_slot),
            slot_b: self.summarize(Slot::B, active_slot),
        }
    }

    fn summarize(&self, slot: Slot, active: Slot) -> SlotSummary {
        SlotSummary {
            slot,
            boot_attempts: self.store.read_attempt_count(slot),
            version: self.slot_version(slot, active),
        }
    }

    /// The active slot's marker is on the running root; the inactive
    /// slot's needs a read-only mount.
    fn slot_version(&self, slot: Slot, active: Slot) -> Option<SystemVersion> {
        if slot == active {
            if let Some(version) = marker::read_running(self.layout) {
                return Some(version);
            }
        }
        let mount_point = self.layout.mount_point(slot);
        self.host
            .mount(self.layout.device(slot), mount_point, true)
            .ok()?;
        let version = marker::read_in_root(self.layout, mount_point);
        let _ = self.host.unmount(mount_point);
        version
    }

    fn stage_kernel(&self, target: Slot, slot_root: &Path) -> Result<()> {
        let payload = slot_root.join(&self.layout.kernel_payload_rel);
        if !payload.is_dir() || fs::read_dir(&payload)?.next().is_none() {
            return Ok(());
        }

        // Preserve the kernel files this payload is about to replace, once
        // per slot; an earlier backup is the pre-update kernel and must not
        // be overwritten by a later activation of the same slot.
        let backup = &self.layout.params(target).kernel_backup_dir;
        if !backup.exists() {
            fs::create_dir_all(backup)?;
            for entry in fs::read_dir(&payload)? {
                let name = entry?.file_name();
                let current = self.layout.boot_dir.join(&name);
                if current.is_dir() {
                    fsutil::copy_tree(&current, &backup.join(&name))?;
                } else if current.is_file() {
                    fs::copy(&current, backup.join(&name))?;
                }
            }
            tracing::info!(
                target: "seesaw.switch",
                slot = %target,
                backup = %backup.display(),
                "kernel files backed up"
            );
        }

        fsutil::copy_tree(&payload, &self.layout.boot_dir)?;
        tracing::info!(target: "seesaw.switch", slot = %target, "slot kernel staged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FakeHost;
    use seesaw_state::FileStateStore;

    struct Fixture {
        store: FileStateStore,
        host: FakeHost,
        layout: DeviceLayout,
        _dir: tempfile::TempDir,
    }

    /// Both slot mount points exist with version markers; boot config
    /// points at slot A; state records say A.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = DeviceLayout::rooted_at(dir.path());
        fs::create_dir_all(layout.boot_config.parent().unwrap()).unwrap();
        fs::write(&layout.boot_config, "root=/dev/mmcblk0p2 rootwait\n").unwrap();
        for (slot, version) in [(Slot::A, "2024.01.15"), (Slot::B, "2024.02.01")] {
            let root = layout.mount_point(slot).to_owned();
            marker::write_in_root(&layout, &root, &version.parse().unwrap()).unwrap();
        }
        let store = FileStateStore::new(layout.clone());
        store.write_active_slot(Slot::A).unwrap();
        store.write_attempt_count(Slot::A, 0).unwrap();
        Fixture {
            store,
            host: FakeHost::new(),
            layout,
            _dir: dir,
        }
    }

    fn switcher(f: &Fixture) -> PartitionSwitcher<'_, FileStateStore, FakeHost> {
        PartitionSwitcher::new(&f.store, &f.host, &f.layout)
    }

    #[test]
    fn activate_flips_pointer_marker_and_counter() {
        let f = fixture();
        f.store.write_attempt_count(Slot::B, 2).unwrap();

        switcher(&f).activate(Slot::B).unwrap();

        assert_eq!(f.store.read_active_slot(), Slot::B);
        assert_eq!(f.store.read_pointer_slot().unwrap(), Some(Slot::B));
        assert_eq!(f.store.read_attempt_count(Slot::B), 0);
        assert!(!f.host.is_mounted(f.layout.mount_point(Slot::B)));
    }

    #[test]
    fn activate_twice_is_identical_to_once() {
        let f = fixture();
        switcher(&f).activate(Slot::B).unwrap();
        let boot_config = fs::read_to_string(&f.layout.boot_config).unwrap();

        switcher(&f).activate(Slot::B).unwrap();

        assert_eq!(f.store.read_active_slot(), Slot::B);
        assert_eq!(f.store.read_pointer_slot().unwrap(), Some(Slot::B));
        assert_eq!(f.store.read_attempt_count(Slot::B), 0);
        assert_eq!(fs::read_to_string(&f.layout.boot_config).unwrap(), boot_config);
    }

    #[test]
    fn unmountable_target_is_invalid_and_touches_nothing() {
        let f = fixture();
        f.host.deny_mounts_of(f.layout.device(Slot::B));

        let err = switcher(&f).activate(Slot::B).unwrap_err();

        assert!(matches!(err, SeesawError::InvalidTarget { slot: Slot::B, .. }));
        assert_eq!(f.store.read_active_slot(), Slot::A);
        assert_eq!(f.store.read_pointer_slot().unwrap(), Some(Slot::A));
    }

    #[test]
    fn missing_marker_is_invalid_and_touches_nothing() {
        let f = fixture();
        fs::remove_file(
            f.layout
                .version_marker_in(f.layout.mount_point(Slot::B)),
        )
        .unwrap();

        let err = switcher(&f).activate(Slot::B).unwrap_err();

        assert!(matches!(err, SeesawError::InvalidTarget { slot: Slot::B, .. }));
        assert_eq!(f.store.read_active_slot(), Slot::A);
        assert!(!f.host.is_mounted(f.layout.mount_point(Slot::B)));
    }

    #[test]
    fn rollback_activates_the_other_slot() {
        let f = fixture();
        switcher(&f).rollback().unwrap();
        assert_eq!(f.store.read_active_slot(), Slot::B);
    }

    #[test]
    fn kernel_payload_is_staged_with_backup() {
        let f = fixture();
        let slot_root = f.layout.mount_point(Slot::B).to_owned();
        fs::create_dir_all(slot_root.join("boot")).unwrap();
        fs::write(slot_root.join("boot/kernel.img"), b"new kernel").unwrap();
        fs::write(f.layout.boot_dir.join("kernel.img"), b"old kernel").unwrap();

        switcher(&f).activate(Slot::B).unwrap();

        assert_eq!(
            fs::read(f.layout.boot_dir.join("kernel.img")).unwrap(),
            b"new kernel"
        );
        assert_eq!(
            fs::read(
                f.layout
                    .params(Slot::B)
                    .kernel_backup_dir
                    .join("kernel.img")
            )
            .unwrap(),
            b"old kernel"
        );
    }

    #[test]
    fn existing_kernel_backup_is_not_overwritten() {
        let f = fixture();
        let slot_root = f.layout.mount_point(Slot::B).to_owned();
        fs::create_dir_all(slot_root.join("boot")).unwrap();
        fs::write(slot_root.join("boot/kernel.img"), b"new kernel").unwrap();
        fs::write(f.layout.boot_dir.join("kernel.img"), b"current").unwrap();
        let backup = &f.layout.params(Slot::B).kernel_backup_dir;
        fs::create_dir_all(backup).unwrap();
        fs::write(backup.join("kernel.img"), b"original").unwrap();

        switcher(&f).activate(Slot::B).unwrap();

        assert_eq!(fs::read(backup.join("kernel.img")).unwrap(), b"original");
    }

    #[test]
    fn report_reflects_state_and_detects_disagreement() {
        let f = fixture();
        f.store.write_attempt_count(Slot::A, 1).unwrap();

        let report = switcher(&f).report();
        assert_eq!(report.active_slot, Slot::A);
        assert_eq!(report.pointer_slot, Some(Slot::A));
        assert!(!report.disagreement);
        assert_eq!(report.slot_a.boot_attempts, 1);
        assert_eq!(
            report.slot_b.version,
            Some("2024.02.01".parse().unwrap())
        );

        // Marker says B while the pointer still says A.
        f.store.write_active_slot(Slot::B).unwrap();
        let report = switcher(&f).report();
        assert!(report.disagreement);
    }
}

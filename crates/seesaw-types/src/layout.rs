//! Where everything lives on the device.
//!
//! Every path the update core touches is named here once and injected into
//! the components that need it. Production code uses [`DeviceLayout::default`];
//! tests build a layout rooted in a temp directory with
//! [`DeviceLayout::rooted_at`]. No component hard-codes a path.

use std::path::{Path, PathBuf};

use crate::Slot;

/// Per-slot device parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotParams {
    /// Block device holding this slot's root filesystem.
    pub device: String,
    /// Where this slot's filesystem is mounted while being inspected or
    /// written. Never the running root.
    pub mount_point: PathBuf,
    /// Where the boot area's kernel files are backed up before this slot's
    /// own kernel payload replaces them.
    pub kernel_backup_dir: PathBuf,
}

/// The full on-device path map consumed by the update core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Directory on the boot medium holding the plain-text state records
    /// (`active_slot`, `boot_attempts_a`, `boot_attempts_b`).
    pub state_dir: PathBuf,
    /// The boot loader command-line file carrying the `root=<device>` token.
    pub boot_config: PathBuf,
    /// The boot area holding the live kernel files (hybrid layouts only).
    pub boot_dir: PathBuf,
    /// Slot A parameters.
    pub slot_a: SlotParams,
    /// Slot B parameters.
    pub slot_b: SlotParams,
    /// Mount point of the persistent data partition. The installer never
    /// writes below this path.
    pub persistent_dir: PathBuf,
    /// Version marker of the running system (the active slot is the running
    /// root, so its marker is read directly, without a mount).
    pub running_version_marker: PathBuf,
    /// Path of the version marker file, relative to a slot filesystem root.
    pub version_marker_rel: PathBuf,
    /// Path of the mount table, relative to a slot filesystem root.
    pub fstab_rel: PathBuf,
    /// Directory inside a slot tree that carries the slot's own kernel
    /// payload, relative to the slot root. Absent on flat layouts.
    pub kernel_payload_rel: PathBuf,
    /// Legacy in-slot staging directory for persistent data, relative to the
    /// slot root. Copied out before a wipe and restored afterwards.
    pub legacy_data_rel: PathBuf,
}

impl DeviceLayout {
    /// Parameters for `slot`.
    #[must_use]
    pub fn params(&self, slot: Slot) -> &SlotParams {
        match slot {
            Slot::A => &self.slot_a,
            Slot::B => &self.slot_b,
        }
    }

    /// Block device of `slot`.
    #[must_use]
    pub fn device(&self, slot: Slot) -> &str {
        &self.params(slot).device
    }

    /// Mount point used when inspecting or writing `slot`.
    #[must_use]
    pub fn mount_point(&self, slot: Slot) -> &Path {
        &self.params(slot).mount_point
    }

    /// The slot whose block device is `device`, if it is one of the two.
    #[must_use]
    pub fn slot_for_device(&self, device: &str) -> Option<Slot> {
        if device == self.slot_a.device {
            Some(Slot::A)
        } else if device == self.slot_b.device {
            Some(Slot::B)
        } else {
            None
        }
    }

    /// Absolute path of the version marker inside a mounted slot tree.
    #[must_use]
    pub fn version_marker_in(&self, slot_root: &Path) -> PathBuf {
        slot_root.join(&self.version_marker_rel)
    }

    /// A layout with every path placed under `root`, for tests and for
    /// operating on an image staged somewhere other than `/`.
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            state_dir: root.join("boot/seesaw"),
            boot_config: root.join("boot/cmdline.txt"),
            boot_dir: root.join("boot"),
            slot_a: SlotParams {
                device: "/dev/mmcblk0p2".to_owned(),
                mount_point: root.join("mnt/slot-a"),
                kernel_backup_dir: root.join("boot/kernel-backup-a"),
            },
            slot_b: SlotParams {
                device: "/dev/mmcblk0p3".to_owned(),
                mount_point: root.join("mnt/slot-b"),
                kernel_backup_dir: root.join("boot/kernel-backup-b"),
            },
            persistent_dir: root.join("data"),
            running_version_marker: root.join("etc/seesaw-version"),
            version_marker_rel: PathBuf::from("etc/seesaw-version"),
            fstab_rel: PathBuf::from("etc/fstab"),
            kernel_payload_rel: PathBuf::from("boot"),
            legacy_data_rel: PathBuf::from("data"),
        }
    }
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self::rooted_at(Path::new("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_selects_the_right_slot() {
        let layout = DeviceLayout::default();
        assert_eq!(layout.device(Slot::A), "/dev/mmcblk0p2");
        assert_eq!(layout.device(Slot::B), "/dev/mmcblk0p3");
        assert_ne!(layout.mount_point(Slot::A), layout.mount_point(Slot::B));
    }

    #[test]
    fn slot_for_device_maps_both_ways() {
        let layout = DeviceLayout::default();
        assert_eq!(layout.slot_for_device("/dev/mmcblk0p2"), Some(Slot::A));
        assert_eq!(layout.slot_for_device("/dev/mmcblk0p3"), Some(Slot::B));
        assert_eq!(layout.slot_for_device("/dev/sda1"), None);
    }

    #[test]
    fn rooted_layout_stays_under_root() {
        let layout = DeviceLayout::rooted_at(Path::new("/tmp/x"));
        assert!(layout.state_dir.starts_with("/tmp/x"));
        assert!(layout.boot_config.starts_with("/tmp/x"));
        assert!(layout.mount_point(Slot::B).starts_with("/tmp/x"));
    }

    #[test]
    fn version_marker_joins_relative_path() {
        let layout = DeviceLayout::default();
        let marker = layout.version_marker_in(Path::new("/mnt/slot-b"));
        assert_eq!(marker, PathBuf::from("/mnt/slot-b/etc/seesaw-version"));
    }
}

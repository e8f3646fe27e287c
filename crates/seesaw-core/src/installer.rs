//! Artifact installation into the inactive slot.
//!
//! The installer owns steps 2 through 8 of an update: mount the inactive
//! slot, preserve any legacy persistent-data residue, wipe, extract the
//! artifact, restore the residue, stamp the version marker, fix the mount
//! table, unmount. Activation (the only state-visible step) and the reboot
//! come last, so a failure anywhere earlier leaves the running slot and
//! the boot pointer exactly as they were.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use seesaw_error::{Result, SeesawError};
use seesaw_state::{marker, StateStore};
use seesaw_types::{DeviceLayout, Slot, SystemVersion};

use crate::fstab;
use crate::fsutil;
use crate::host::Host;
use crate::switcher::PartitionSwitcher;

/// Installs a verified artifact into the inactive slot and activates it.
pub struct Installer<'a, S, H> {
    store: &'a S,
    host: &'a H,
    layout: &'a DeviceLayout,
}

impl<'a, S: StateStore, H: Host> Installer<'a, S, H> {
    /// An installer over the given store, host, and layout.
    #[must_use]
    pub fn new(store: &'a S, host: &'a H, layout: &'a DeviceLayout) -> Self {
        Self {
            store,
            host,
            layout,
        }
    }

    /// Install the artifact at `artifact` as `version` into the slot
    /// opposite the current active one, then activate it and reboot.
    ///
    /// The artifact must already be signature-verified; the installer
    /// trusts its caller on that and checks nothing cryptographic.
    pub fn install(&self, artifact: &Path, version: &SystemVersion) -> Result<()> {
        let current = self.store.read_active_slot();
        let target = current.other();
        tracing::info!(
            target: "seesaw.install",
            current = %current,
            slot = %target,
            version = %version,
            artifact = %artifact.display(),
            "installing update"
        );

        let device = self.layout.device(target);
        let mount_point = self.layout.mount_point(target);
        self.host.mount(device, mount_point, false)?;

        // Everything between mount and unmount funnels through one result
        // so the unmount always runs.
        let populated = self.populate(target, mount_point, artifact, version);
        let unmounted = self.host.unmount(mount_point);
        populated?;
        unmounted?;

        PartitionSwitcher::new(self.store, self.host, self.layout).activate(target)?;

        tracing::info!(
            target: "seesaw.install",
            slot = %target,
            version = %version,
            "update installed, rebooting"
        );
        self.host.reboot()
    }

    fn populate(
        &self,
        target: Slot,
        mount_point: &Path,
        artifact: &Path,
        version: &SystemVersion,
    ) -> Result<()> {
        // Legacy layouts staged persistent data inside the slot tree. If
        // any is present it must survive the wipe byte for byte.
        let legacy = mount_point.join(&self.layout.legacy_data_rel);
        let residue = if legacy.is_dir() {
            let scratch = tempfile::tempdir()?;
            fsutil::copy_tree(&legacy, scratch.path())?;
            tracing::info!(
                target: "seesaw.install",
                slot = %target,
                path = %legacy.display(),
                "legacy persistent data copied out before wipe"
            );
            Some(scratch)
        } else {
            None
        };

        fsutil::wipe_dir(mount_point)?;
        self.extract(artifact, mount_point)?;
        tracing::info!(target: "seesaw.install", slot = %target, "artifact extracted");

        if let Some(scratch) = &residue {
            fsutil::copy_tree(scratch.path(), &legacy)?;
            tracing::info!(
                target: "seesaw.install",
                slot = %target,
                "legacy persistent data restored"
            );
        }

        marker::write_in_root(self.layout, mount_point, version)?;
        fstab::rewrite_in_root(self.layout, mount_point, target)?;
        Ok(())
    }

    fn extract(&self, artifact: &Path, dst: &Path) -> Result<()> {
        let file = File::open(artifact).map_err(|err| {
            SeesawError::extraction(format!("cannot open '{}': {err}", artifact.display()))
        })?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        archive.set_preserve_permissions(true);
        archive
            .unpack(dst)
            .map_err(|err| SeesawError::extraction(err.to_string()))
    }
}

//! Host command delegation.
//!
//! Mounting, unmounting, and rebooting are delegated to the host's own
//! tools rather than reimplemented with raw syscalls; the update core only
//! needs their success or failure, and the tools already handle the
//! filesystem-type and option zoo. The [`Host`] trait is the seam: the
//! production implementation spawns the commands, [`FakeHost`] gives tests
//! a recorded, failure-injectable stand-in that needs no privileges.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use seesaw_error::{Result, SeesawError};

/// Mount, unmount, and reboot operations.
pub trait Host {
    /// Mount `device` at `mount_point`, creating the mount point if needed.
    fn mount(&self, device: &str, mount_point: &Path, read_only: bool) -> Result<()>;

    /// Unmount whatever is mounted at `mount_point`.
    fn unmount(&self, mount_point: &Path) -> Result<()>;

    /// Flush filesystems and reboot the device. On the production host this
    /// does not return in any meaningful sense; callers treat a return as
    /// "reboot is in flight".
    fn reboot(&self) -> Result<()>;
}

/// The production [`Host`]: spawns `mount`, `umount`, `sync`, `reboot`.
#[derive(Debug, Clone, Default)]
pub struct HostSystem;

impl HostSystem {
    /// Create the production host.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn run_checked(command: &mut Command) -> Result<()> {
    let rendered = format!("{command:?}");
    let output = command.output().map_err(|err| SeesawError::CommandFailed {
        command: rendered.clone(),
        status: None,
        stderr: err.to_string(),
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(SeesawError::CommandFailed {
            command: rendered,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

impl Host for HostSystem {
    fn mount(&self, device: &str, mount_point: &Path, read_only: bool) -> Result<()> {
        std::fs::create_dir_all(mount_point)?;
        let mut command = Command::new("mount");
        if read_only {
            command.args(["-o", "ro"]);
        }
        command.arg(device).arg(mount_point);
        run_checked(&mut command).map_err(|err| SeesawError::MountFailed {
            device: device.to_owned(),
            mount_point: mount_point.to_owned(),
            detail: err.to_string(),
        })
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        run_checked(Command::new("umount").arg(mount_point))
    }

    fn reboot(&self) -> Result<()> {
        // Flush first so the state records written moments ago hit the
        // medium even if the reboot path is abrupt.
        run_checked(&mut Command::new("sync"))?;
        run_checked(&mut Command::new("reboot"))
    }
}

/// A [`Host`] for tests: mount points are plain directories, every call is
/// recorded, and failures can be injected per device.
#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    mounted: HashMap<PathBuf, String>,
    denied_devices: HashSet<String>,
    reboots: u32,
}

impl FakeHost {
    /// A fake host that accepts every operation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future mount of `device` fail, simulating a slot whose
    /// filesystem is damaged.
    pub fn deny_mounts_of(&self, device: &str) {
        self.state
            .lock()
            .expect("fake host lock")
            .denied_devices
            .insert(device.to_owned());
    }

    /// Number of reboots requested so far.
    #[must_use]
    pub fn reboot_count(&self) -> u32 {
        self.state.lock().expect("fake host lock").reboots
    }

    /// Whether something is currently mounted at `mount_point`.
    #[must_use]
    pub fn is_mounted(&self, mount_point: &Path) -> bool {
        self.state
            .lock()
            .expect("fake host lock")
            .mounted
            .contains_key(mount_point)
    }
}

impl Host for FakeHost {
    fn mount(&self, device: &str, mount_point: &Path, _read_only: bool) -> Result<()> {
        let mut state = self.state.lock().expect("fake host lock");
        if state.denied_devices.contains(device) {
            return Err(SeesawError::MountFailed {
                device: device.to_owned(),
                mount_point: mount_point.to_owned(),
                detail: "mount denied by test".to_owned(),
            });
        }
        std::fs::create_dir_all(mount_point)?;
        state
            .mounted
            .insert(mount_point.to_owned(), device.to_owned());
        Ok(())
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        let mut state = self.state.lock().expect("fake host lock");
        if state.mounted.remove(mount_point).is_none() {
            return Err(SeesawError::CommandFailed {
                command: format!("umount {}", mount_point.display()),
                status: Some(32),
                stderr: "not mounted".to_owned(),
            });
        }
        Ok(())
    }

    fn reboot(&self) -> Result<()> {
        self.state.lock().expect("fake host lock").reboots += 1;
        Ok(())
    }
}

//! The update daemon: a single blocking poll loop.
//!
//! Each cycle fetches the version metadata document, compares the
//! advertised version with the running system's marker, and when they
//! differ downloads artifact and signature into per-cycle scratch space,
//! verifies the signature, and hands the artifact to the installer. The
//! installer reboots the device on success, so a cycle that installs never
//! really returns on hardware; everything after that point exists for the
//! tests and for failure paths.
//!
//! Nothing is retried within a cycle. A transient failure costs one
//! interval; the next cycle starts from scratch.

pub mod fetch;
pub mod manifest;

pub use fetch::{HttpFetcher, UpdateFetcher};
pub use manifest::UpdateManifest;

use std::fs;

use seesaw_core::{Host, Installer};
use seesaw_error::Result;
use seesaw_state::{marker, StateStore};
use seesaw_types::{DeviceLayout, SystemVersion, UpdateConfig};
use seesaw_verify::UpdateKey;

/// What one poll cycle concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The advertised version matches the running one.
    UpToDate {
        /// The version both sides agree on.
        version: SystemVersion,
    },
    /// A new version was verified, installed, and a reboot requested.
    Installed {
        /// The version the device was running, if its marker was readable.
        from: Option<SystemVersion>,
        /// The freshly installed version.
        to: SystemVersion,
    },
}

/// The polling daemon. Generic over store, host, and fetcher so the cycle
/// logic is testable without a network or a device.
pub struct UpdateDaemon<'a, S, H, F> {
    store: &'a S,
    host: &'a H,
    layout: &'a DeviceLayout,
    config: &'a UpdateConfig,
    fetcher: &'a F,
    key: &'a UpdateKey,
}

impl<'a, S, H, F> UpdateDaemon<'a, S, H, F>
where
    S: StateStore,
    H: Host,
    F: UpdateFetcher,
{
    /// A daemon over the given collaborators.
    #[must_use]
    pub fn new(
        store: &'a S,
        host: &'a H,
        layout: &'a DeviceLayout,
        config: &'a UpdateConfig,
        fetcher: &'a F,
        key: &'a UpdateKey,
    ) -> Self {
        Self {
            store,
            host,
            layout,
            config,
            fetcher,
            key,
        }
    }

    /// Run one poll cycle.
    pub fn run_cycle(&self) -> Result<CycleOutcome> {
        let manifest = self.fetcher.fetch_manifest(&self.config.update_server)?;
        let current = marker::read_running(self.layout);
        tracing::info!(
            target: "seesaw.daemon",
            latest = %manifest.latest_version,
            current = current.as_ref().map(SystemVersion::as_str).unwrap_or("<unreadable>"),
            "poll cycle"
        );

        // An unreadable local marker reads as None and never equals the
        // advertised version, so a device with a damaged marker converges
        // onto a known version instead of idling forever.
        if current.as_ref() == Some(&manifest.latest_version) {
            return Ok(CycleOutcome::UpToDate {
                version: manifest.latest_version,
            });
        }

        // Scratch space lives for exactly one cycle; the TempDir cleans up
        // the download on success and failure alike.
        fs::create_dir_all(&self.config.scratch_dir)?;
        let scratch = tempfile::tempdir_in(&self.config.scratch_dir)?;

        let artifact_url = manifest.artifact_url(&self.config.update_server)?;
        let signature_url = manifest.signature_url(&self.config.update_server)?;
        let payload = self.fetcher.fetch_bytes(&artifact_url)?;
        let signature = self.fetcher.fetch_bytes(&signature_url)?;
        tracing::info!(
            target: "seesaw.daemon",
            version = %manifest.latest_version,
            artifact_bytes = payload.len(),
            "artifact downloaded, verifying"
        );

        self.key.verify(&payload, &signature)?;

        let artifact_path = scratch.path().join("update.tar.gz");
        fs::write(&artifact_path, &payload)?;
        Installer::new(self.store, self.host, self.layout)
            .install(&artifact_path, &manifest.latest_version)?;

        Ok(CycleOutcome::Installed {
            from: current,
            to: manifest.latest_version,
        })
    }

    /// Poll forever. Cycle failures are logged and absorbed; the loop
    /// itself only ends with the process.
    pub fn run_forever(&self) -> ! {
        loop {
            match self.run_cycle() {
                Ok(CycleOutcome::UpToDate { version }) => {
                    tracing::info!(target: "seesaw.daemon", version = %version, "up to date");
                }
                Ok(CycleOutcome::Installed { from, to }) => {
                    tracing::info!(
                        target: "seesaw.daemon",
                        from = from.as_ref().map(SystemVersion::as_str).unwrap_or("<unknown>"),
                        to = %to,
                        "update installed, reboot in flight"
                    );
                }
                Err(err) if err.is_transient() => {
                    tracing::info!(
                        target: "seesaw.daemon",
                        error = %err,
                        "no update this cycle"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        target: "seesaw.daemon",
                        error = %err,
                        "update attempt failed"
                    );
                }
            }
            std::thread::sleep(self.config.check_interval);
        }
    }
}

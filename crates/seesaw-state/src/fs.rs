use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use seesaw_error::{Result, SeesawError};
use seesaw_types::{DeviceLayout, Slot};

use crate::{atomic, attempts_file, bootconfig, StateStore, ACTIVE_SLOT_FILE};

/// The production [`StateStore`]: plain-text records under the layout's
/// state directory plus the boot configuration file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    layout: DeviceLayout,
}

impl FileStateStore {
    /// A store operating on `layout`'s paths. The state directory is
    /// created on first write, not here.
    #[must_use]
    pub fn new(layout: DeviceLayout) -> Self {
        Self { layout }
    }

    /// The layout this store operates on.
    #[must_use]
    pub fn layout(&self) -> &DeviceLayout {
        &self.layout
    }

    fn active_slot_path(&self) -> PathBuf {
        self.layout.state_dir.join(ACTIVE_SLOT_FILE)
    }

    fn attempts_path(&self, slot: Slot) -> PathBuf {
        self.layout.state_dir.join(attempts_file(slot))
    }

    fn write_record(&self, path: &Path, value: &str) -> Result<()> {
        fs::create_dir_all(&self.layout.state_dir)?;
        let mut content = value.to_owned();
        content.push('\n');
        atomic::replace_file(path, content.as_bytes())?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn read_active_slot(&self) -> Slot {
        let path = self.active_slot_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        target: "seesaw.store",
                        path = %path.display(),
                        error = %err,
                        "active-slot record unreadable, defaulting to A"
                    );
                }
                return Slot::A;
            }
        };
        match content.parse() {
            Ok(slot) => slot,
            Err(_) => {
                tracing::warn!(
                    target: "seesaw.store",
                    path = %path.display(),
                    content = %content.trim(),
                    "active-slot record corrupt, defaulting to A"
                );
                Slot::A
            }
        }
    }

    fn write_active_slot(&self, slot: Slot) -> Result<()> {
        self.write_record(&self.active_slot_path(), slot.as_str())
    }

    fn read_attempt_count(&self, slot: Slot) -> u32 {
        let path = self.attempts_path(slot);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return 0,
        };
        match content.trim().parse() {
            Ok(count) => count,
            Err(_) => {
                tracing::warn!(
                    target: "seesaw.store",
                    path = %path.display(),
                    content = %content.trim(),
                    "attempt counter corrupt, reading as 0"
                );
                0
            }
        }
    }

    fn write_attempt_count(&self, slot: Slot, count: u32) -> Result<()> {
        self.write_record(&self.attempts_path(slot), &count.to_string())
    }

    fn read_pointer_slot(&self) -> Result<Option<Slot>> {
        let content = fs::read_to_string(&self.layout.boot_config)?;
        Ok(bootconfig::pointer_device(&content)
            .and_then(|device| self.layout.slot_for_device(device)))
    }

    fn write_pointer(&self, slot: Slot) -> Result<()> {
        let path = &self.layout.boot_config;
        let content = fs::read_to_string(path)?;
        let device = self.layout.device(slot);
        let rewritten = bootconfig::rewrite_pointer(&content, device).ok_or_else(|| {
            SeesawError::StateCorruption {
                file: path.clone(),
                content: content.clone(),
            }
        })?;
        atomic::replace_file(path, rewritten.as_bytes())?;
        tracing::info!(
            target: "seesaw.store",
            slot = %slot,
            device,
            "boot pointer rewritten"
        );
        Ok(())
    }
}

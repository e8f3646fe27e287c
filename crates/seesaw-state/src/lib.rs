//! Persistent A/B state: the active-slot marker, per-slot boot attempt
//! counters, the boot loader pointer, and version marker files.
//!
//! Everything here is plain text in well-known locations on the boot
//! medium, chosen for legibility after a failure: each logical field lives
//! in its own file, so a torn write can damage at most one of them, and a
//! human with a card reader can inspect and repair the state with an
//! editor.
//!
//! The crash-safety contract is concentrated in [`atomic::replace_file`]:
//! every write is a whole-file replacement (write-new, fsync, rename), so
//! readers observe either the old value or the new one, never a prefix.

pub mod atomic;
pub mod bootconfig;
pub mod marker;

mod fs;

pub use fs::FileStateStore;

use seesaw_error::{Result, SeesawError};
use seesaw_types::Slot;

/// File name of the active-slot marker inside the state directory.
pub const ACTIVE_SLOT_FILE: &str = "active_slot";

/// File name of a slot's boot attempt counter inside the state directory.
#[must_use]
pub fn attempts_file(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "boot_attempts_a",
        Slot::B => "boot_attempts_b",
    }
}

/// Access to the persisted partition state.
///
/// Injected into the switcher, validator, and daemon so the crash-safety
/// contract lives in one implementation and tests can point the same
/// implementation at a scratch directory.
pub trait StateStore {
    /// The slot named by the active-slot record.
    ///
    /// Missing or unparseable content heals to [`Slot::A`]: a guaranteed
    /// answer is worth more here than a precise error, since this value
    /// decides which partition the rest of the system operates on.
    fn read_active_slot(&self) -> Slot;

    /// Persist `slot` as the active-slot record.
    fn write_active_slot(&self, slot: Slot) -> Result<()>;

    /// Consecutive boot attempts recorded for `slot`. Missing or
    /// unparseable content reads as 0.
    fn read_attempt_count(&self, slot: Slot) -> u32;

    /// Persist the boot attempt counter for `slot`.
    fn write_attempt_count(&self, slot: Slot, count: u32) -> Result<()>;

    /// The slot the boot loader pointer currently references.
    ///
    /// `Ok(None)` when the pointer token is missing or names a device that
    /// is neither slot; I/O failures propagate.
    fn read_pointer_slot(&self) -> Result<Option<Slot>>;

    /// Rewrite the boot loader pointer to reference `slot`'s root device.
    fn write_pointer(&self, slot: Slot) -> Result<()>;

    /// Error with [`SeesawError::PointerStateDisagreement`] when the boot
    /// pointer and the active-slot record name different slots.
    fn check_agreement(&self) -> Result<()> {
        let marker = self.read_active_slot();
        match self.read_pointer_slot()? {
            Some(pointer) if pointer != marker => {
                Err(SeesawError::PointerStateDisagreement { pointer, marker })
            }
            _ => Ok(()),
        }
    }
}

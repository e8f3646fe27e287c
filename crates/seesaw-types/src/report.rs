//! Diagnostic snapshot of both slots.

use crate::{Slot, SystemVersion};

/// Per-slot summary inside a [`SlotReport`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SlotSummary {
    /// The slot being summarized.
    pub slot: Slot,
    /// Consecutive boot attempts since the slot was last confirmed healthy.
    pub boot_attempts: u32,
    /// Installed version, if the slot's marker was readable.
    pub version: Option<SystemVersion>,
}

/// Snapshot of the A/B state as seen on disk, for `partition-switcher
/// status` and daemon logging.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SlotReport {
    /// The slot named by the active-slot marker file.
    pub active_slot: Slot,
    /// The slot the boot loader pointer references, if it parsed.
    pub pointer_slot: Option<Slot>,
    /// True when pointer and marker name different slots. This is the one
    /// state the system cannot self-heal; it is reported, never repaired
    /// automatically.
    pub disagreement: bool,
    /// Summary for slot A.
    pub slot_a: SlotSummary,
    /// Summary for slot B.
    pub slot_b: SlotSummary,
}

impl SlotReport {
    /// Summary for `slot`.
    #[must_use]
    pub fn summary(&self, slot: Slot) -> &SlotSummary {
        match slot {
            Slot::A => &self.slot_a,
            Slot::B => &self.slot_b,
        }
    }
}

pub mod config;
pub mod layout;
pub mod report;

pub use config::{ConfigError, UpdateConfig, ValidatorConfig};
pub use layout::{DeviceLayout, SlotParams};
pub use report::{SlotReport, SlotSummary};

use std::fmt;
use std::str::FromStr;

/// One of the two interchangeable system partition slots.
///
/// Each slot holds a complete, independently bootable OS installation.
/// Exactly one slot is active at any time; the other is the target of the
/// next update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Slot {
    /// Slot A, the fail-safe default when persisted state is unreadable.
    A,
    /// Slot B.
    B,
}

impl Slot {
    /// The other slot. `A.other() == B` and `B.other() == A`.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// The single-token on-disk spelling (`"A"` or `"B"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = InvalidSlotToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(InvalidSlotToken {
                token: other.to_owned(),
            }),
        }
    }
}

/// Error returned when parsing a slot token that is neither `A` nor `B`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSlotToken {
    /// The rejected token, trimmed.
    pub token: String,
}

impl fmt::Display for InvalidSlotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid slot token {:?} (expected A or B)", self.token)
    }
}

impl std::error::Error for InvalidSlotToken {}

/// An installed or advertised system version identifier.
///
/// Versions are opaque, date-based strings (`"2024.02.01"`). The update
/// protocol compares them only for inequality; no ordering is assumed
/// beyond "different means a new artifact exists".
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SystemVersion(String);

impl SystemVersion {
    /// The raw version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SystemVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidVersion::Empty);
        }
        // Version strings land in file names and marker files; reject
        // anything that could break out of either.
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '/')
        {
            return Err(InvalidVersion::ForbiddenCharacter {
                version: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl TryFrom<String> for SystemVersion {
    type Error = InvalidVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SystemVersion> for String {
    fn from(version: SystemVersion) -> Self {
        version.0
    }
}

/// Error returned when a version string is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidVersion {
    /// The version string was empty after trimming.
    Empty,
    /// The version string contains whitespace, control, or path characters.
    ForbiddenCharacter {
        /// The rejected version string.
        version: String,
    },
}

impl fmt::Display for InvalidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("version string is empty"),
            Self::ForbiddenCharacter { version } => {
                write!(f, "version string {version:?} contains forbidden characters")
            }
        }
    }
}

impl std::error::Error for InvalidVersion {}

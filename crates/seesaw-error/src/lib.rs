use std::path::PathBuf;

use seesaw_types::Slot;
use thiserror::Error;

/// Primary error type for update and rollback operations.
///
/// Every library-level operation returns one of these so callers can make
/// policy decisions (retry vs abort vs rollback) instead of reacting to
/// opaque faults. Only the CLI binaries turn these into process exits.
#[derive(Error, Debug)]
pub enum SeesawError {
    // === Update attempt failures (abort the attempt, device unharmed) ===
    /// The detached signature does not verify against the artifact bytes.
    ///
    /// Malformed signatures, key mismatches, and digest mismatches all
    /// collapse here; there is no partial trust.
    #[error("artifact signature verification failed")]
    VerificationFailed,

    /// The configured public key file is missing or not a usable RSA key.
    #[error("unusable public key '{path}': {detail}")]
    InvalidKey { path: PathBuf, detail: String },

    /// The target slot is not mountable or carries no version marker.
    #[error("slot {slot} is not a valid activation target: {reason}")]
    InvalidTarget { slot: Slot, reason: String },

    /// Extraction into the target slot failed (disk full, corrupt archive,
    /// I/O error). The active slot is untouched.
    #[error("artifact extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    // === Transient network conditions (retried next poll cycle) ===
    /// A download did not complete.
    #[error("download of {url} failed: {detail}")]
    DownloadFailed { url: String, detail: String },

    /// A request exceeded the configured HTTP timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The version metadata document did not parse into the expected shape.
    #[error("update manifest invalid: {detail}")]
    ManifestInvalid { detail: String },

    // === Persisted state conditions ===
    /// A state record was unparseable. Reads heal this by defaulting, so
    /// this variant surfaces only from paths that refuse to guess.
    #[error("state record '{file}' is corrupt: {content:?}")]
    StateCorruption { file: PathBuf, content: String },

    /// The boot loader pointer and the active-slot record name different
    /// slots. The one condition the design cannot self-heal; recovery is
    /// manual activation with an explicit slot argument.
    #[error(
        "boot pointer references slot {pointer} but active-slot record says {marker}; \
         run `partition-switcher {marker}` (or {pointer}) to reconcile"
    )]
    PointerStateDisagreement { pointer: Slot, marker: Slot },

    // === Host interaction ===
    /// Mounting a slot filesystem failed.
    #[error("mount of {device} at '{mount_point}' failed: {detail}")]
    MountFailed {
        device: String,
        mount_point: PathBuf,
        detail: String,
    },

    /// A delegated host command exited unsuccessfully.
    #[error("command `{command}` failed with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A set environment variable could not be used as configuration.
    #[error(transparent)]
    Config(#[from] seesaw_types::ConfigError),
}

impl SeesawError {
    /// Whether this condition is expected to clear on its own, making a
    /// retry on the next poll cycle the right policy.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DownloadFailed { .. } | Self::Timeout { .. }
        )
    }

    /// Whether this failure aborts only the current update attempt, leaving
    /// the device bootable on its current slot.
    #[must_use]
    pub const fn aborts_attempt_only(&self) -> bool {
        matches!(
            self,
            Self::VerificationFailed
                | Self::InvalidTarget { .. }
                | Self::ExtractionFailed { .. }
                | Self::DownloadFailed { .. }
                | Self::Timeout { .. }
                | Self::ManifestInvalid { .. }
        )
    }

    /// Process exit code for CLI use. Stable per variant so init scripts
    /// and post-mortem tooling can branch on them.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::VerificationFailed => 10,
            Self::InvalidKey { .. } => 11,
            Self::InvalidTarget { .. } => 12,
            Self::ExtractionFailed { .. } => 13,
            Self::DownloadFailed { .. } => 14,
            Self::Timeout { .. } => 15,
            Self::ManifestInvalid { .. } => 16,
            Self::StateCorruption { .. } => 17,
            Self::PointerStateDisagreement { .. } => 18,
            Self::MountFailed { .. } => 19,
            Self::CommandFailed { .. } => 20,
            Self::Io(_) => 21,
            Self::Config(_) => 22,
        }
    }

    /// Human-friendly recovery hint, where one exists.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::VerificationFailed => {
                Some("Re-download the artifact; if it persists, the release is bad")
            }
            Self::DownloadFailed { .. } | Self::Timeout { .. } => {
                Some("Transient network condition; the next poll cycle retries")
            }
            Self::PointerStateDisagreement { .. } => {
                Some("Reconcile manually with `partition-switcher <A|B>`")
            }
            Self::InvalidKey { .. } => {
                Some("Check the public key path and PEM encoding")
            }
            _ => None,
        }
    }

    /// Convenience constructor for [`Self::InvalidTarget`].
    pub fn invalid_target(slot: Slot, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            slot,
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Self::ExtractionFailed`].
    pub fn extraction(detail: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`Self::ManifestInvalid`].
    pub fn manifest(detail: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            detail: detail.into(),
        }
    }
}

/// Result type alias using [`SeesawError`].
pub type Result<T> = std::result::Result<T, SeesawError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_verification_failed() {
        assert_eq!(
            SeesawError::VerificationFailed.to_string(),
            "artifact signature verification failed"
        );
    }

    #[test]
    fn display_disagreement_names_both_slots() {
        let err = SeesawError::PointerStateDisagreement {
            pointer: Slot::B,
            marker: Slot::A,
        };
        let text = err.to_string();
        assert!(text.contains("slot B"));
        assert!(text.contains("says A"));
    }

    #[test]
    fn transience_classification() {
        assert!(SeesawError::Timeout { url: "u".into() }.is_transient());
        assert!(
            SeesawError::DownloadFailed {
                url: "u".into(),
                detail: "d".into()
            }
            .is_transient()
        );
        assert!(!SeesawError::VerificationFailed.is_transient());
        assert!(!SeesawError::extraction("disk full").is_transient());
    }

    #[test]
    fn attempt_abort_classification() {
        assert!(SeesawError::VerificationFailed.aborts_attempt_only());
        assert!(SeesawError::extraction("corrupt archive").aborts_attempt_only());
        assert!(
            !SeesawError::PointerStateDisagreement {
                pointer: Slot::A,
                marker: Slot::B
            }
            .aborts_attempt_only()
        );
    }

    #[test]
    fn exit_codes_are_nonzero_and_distinct() {
        let errors = [
            SeesawError::VerificationFailed,
            SeesawError::invalid_target(Slot::B, "no marker"),
            SeesawError::extraction("x"),
            SeesawError::Timeout { url: "u".into() },
            SeesawError::StateCorruption {
                file: PathBuf::from("active_slot"),
                content: "Q".into(),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(SeesawError::exit_code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: SeesawError = io.into();
        assert!(matches!(err, SeesawError::Io(_)));
    }

    #[test]
    fn suggestions_exist_for_operator_visible_cases() {
        assert!(
            SeesawError::PointerStateDisagreement {
                pointer: Slot::A,
                marker: Slot::B
            }
            .suggestion()
            .is_some()
        );
        assert!(SeesawError::extraction("x").suggestion().is_none());
    }
}

//! Shared plumbing for the operational binaries.
//!
//! Each binary is a thin `main` over a testable body; what they share
//! lives here: tracing setup, error reporting with exit codes, and the
//! slot report renderer.

use std::io::Write;

use seesaw_error::SeesawError;
use seesaw_types::{Slot, SlotReport, SlotSummary};

/// Install the global tracing subscriber: `RUST_LOG`-filtered, writing to
/// stderr so stdout stays parseable.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print `err` (and its recovery hint, if any) to `out` and return the
/// process exit code for it.
pub fn report_error<W: Write>(out: &mut W, err: &SeesawError) -> i32 {
    let _ = writeln!(out, "error: {err}");
    if let Some(hint) = err.suggestion() {
        let _ = writeln!(out, "hint: {hint}");
    }
    err.exit_code()
}

/// Render a slot report as human-readable lines.
#[must_use]
pub fn format_report(report: &SlotReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("active slot:  {}\n", report.active_slot));
    match report.pointer_slot {
        Some(slot) => out.push_str(&format!("boot pointer: {slot}\n")),
        None => out.push_str("boot pointer: <unreadable>\n"),
    }
    for slot in [Slot::A, Slot::B] {
        out.push_str(&format_summary(report.summary(slot)));
    }
    if report.disagreement {
        out.push_str(
            "WARNING: boot pointer and active-slot record disagree; \
             reconcile with `partition-switcher <A|B>`\n",
        );
    }
    out
}

fn format_summary(summary: &SlotSummary) -> String {
    let version = summary
        .version
        .as_ref()
        .map_or("<no marker>", |v| v.as_str());
    format!(
        "slot {}: {} boot attempts, version {}\n",
        summary.slot, summary.boot_attempts, version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(disagreement: bool) -> SlotReport {
        SlotReport {
            active_slot: Slot::A,
            pointer_slot: Some(if disagreement { Slot::B } else { Slot::A }),
            disagreement,
            slot_a: SlotSummary {
                slot: Slot::A,
                boot_attempts: 0,
                version: Some("2024.01.15".parse().unwrap()),
            },
            slot_b: SlotSummary {
                slot: Slot::B,
                boot_attempts: 2,
                version: None,
            },
        }
    }

    #[test]
    fn report_renders_every_line() {
        let text = format_report(&report(false));
        assert!(text.contains("active slot:  A"));
        assert!(text.contains("boot pointer: A"));
        assert!(text.contains("slot A: 0 boot attempts, version 2024.01.15"));
        assert!(text.contains("slot B: 2 boot attempts, version <no marker>"));
        assert!(!text.contains("WARNING"));
    }

    #[test]
    fn report_warns_on_disagreement() {
        let text = format_report(&report(true));
        assert!(text.contains("WARNING"));
    }

    #[test]
    fn error_reporting_returns_exit_code() {
        let mut out = Vec::new();
        let code = report_error(&mut out, &SeesawError::VerificationFailed);
        assert_eq!(code, SeesawError::VerificationFailed.exit_code());
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("error: "));
        assert!(text.contains("hint: "));
    }
}

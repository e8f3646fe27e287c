//! Manual slot activation, rollback, and status.
//!
//! `partition-switcher <A|B>` is also the documented recovery path when
//! the boot pointer and active-slot record disagree.

use std::ffi::OsString;
use std::io::Write;

use seesaw_cli::{format_report, init_tracing, report_error};
use seesaw_core::{HostSystem, PartitionSwitcher};
use seesaw_state::FileStateStore;
use seesaw_types::{DeviceLayout, Slot};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Activate(Slot),
    Rollback,
    Status { json: bool },
    Help,
}

fn main() {
    init_tracing();
    let code = run(std::env::args_os(), &mut std::io::stdout(), &mut std::io::stderr());
    if code != 0 {
        std::process::exit(code);
    }
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let action = match parse_args(args) {
        Ok(action) => action,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };

    if action == Action::Help {
        let _ = write_usage(out);
        return 0;
    }

    let layout = DeviceLayout::default();
    let store = FileStateStore::new(layout.clone());
    let host = HostSystem::new();
    let switcher = PartitionSwitcher::new(&store, &host, &layout);

    match action {
        Action::Activate(slot) => {
            let _ = writeln!(out, "activating slot {slot}");
            match switcher.activate(slot) {
                Ok(()) => {
                    let _ = writeln!(out, "slot {slot} is now active");
                    0
                }
                Err(error) => report_error(err, &error),
            }
        }
        Action::Rollback => {
            let _ = writeln!(out, "rolling back to the inactive slot");
            match switcher.rollback() {
                Ok(()) => {
                    let _ = writeln!(out, "rollback complete");
                    0
                }
                Err(error) => report_error(err, &error),
            }
        }
        Action::Status { json } => {
            let report = switcher.report();
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(body) => {
                        let _ = writeln!(out, "{body}");
                    }
                    Err(error) => {
                        let _ = writeln!(err, "error: {error}");
                        return 1;
                    }
                }
            } else {
                let _ = write!(out, "{}", format_report(&report));
            }
            0
        }
        Action::Help => unreachable!("handled above"),
    }
}

fn parse_args<I>(args: I) -> Result<Action, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let first = match iter.next() {
        Some(arg) => arg,
        None => return Err("missing argument".to_owned()),
    };
    let first = first.to_string_lossy();

    let action = match first.as_ref() {
        "-h" | "--help" => Action::Help,
        "rollback" => Action::Rollback,
        "status" => {
            let mut json = false;
            for rest in iter.by_ref() {
                match rest.to_string_lossy().as_ref() {
                    "--json" => json = true,
                    other => return Err(format!("unexpected argument '{other}'")),
                }
            }
            Action::Status { json }
        }
        token => match token.parse::<Slot>() {
            Ok(slot) => Action::Activate(slot),
            Err(_) => return Err(format!("expected A, B, rollback, or status, got '{token}'")),
        },
    };

    if !matches!(action, Action::Status { .. }) {
        if let Some(extra) = iter.next() {
            return Err(format!(
                "unexpected argument '{}'",
                extra.to_string_lossy()
            ));
        }
    }
    Ok(action)
}

fn write_usage<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "usage: partition-switcher <A|B>")?;
    writeln!(out, "       partition-switcher rollback")?;
    writeln!(out, "       partition-switcher status [--json]")?;
    writeln!(out)?;
    writeln!(out, "Activate a partition slot, roll back to the inactive")?;
    writeln!(out, "slot, or print both slots' state.")
}

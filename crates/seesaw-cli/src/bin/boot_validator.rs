//! Per-boot validation entry point, invoked once by the init system.
//!
//! Waits out the configured startup delay, then runs the validator state
//! machine: record the boot attempt, roll back past the failure threshold,
//! confirm and reset on a healthy probe, or fail forward and let the next
//! boot decide.

use std::ffi::OsString;
use std::io::Write;

use seesaw_cli::{init_tracing, report_error};
use seesaw_core::{BootValidator, HostSystem, TcpReachability, ValidatorOutcome};
use seesaw_state::FileStateStore;
use seesaw_types::{DeviceLayout, ValidatorConfig};

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
    if let Err(message) = parse_args(args) {
        let _ = writeln!(err, "error: {message}");
        let _ = writeln!(err, "usage: boot-validator");
        return 2;
    }

    let config = ValidatorConfig::default();
    let layout = DeviceLayout::default();
    let store = FileStateStore::new(layout.clone());
    let host = HostSystem::new();
    let probe = TcpReachability::new(config.probe_addr.clone(), config.probe_timeout);

    // Let services and the network settle before sampling health; an
    // immediate probe would read every cold boot as broken.
    std::thread::sleep(config.startup_delay);

    let validator = BootValidator::new(&store, &host, &layout, &config);
    match validator.run(&probe) {
        Ok(ValidatorOutcome::Healthy) => {
            let _ = writeln!(out, "boot confirmed healthy");
            0
        }
        Ok(ValidatorOutcome::FailingForward { attempts }) => {
            let _ = writeln!(out, "health probe failed (attempt {attempts}); deferring to next boot");
            0
        }
        Ok(ValidatorOutcome::RolledBack { from, to }) => {
            let _ = writeln!(out, "slot {from} exceeded the failure threshold; rolled back to {to}");
            0
        }
        Err(error) => report_error(err, &error),
    }
}

fn parse_args<I>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();
    match iter.next() {
        None => Ok(()),
        Some(arg) => Err(format!(
            "unexpected argument '{}'",
            arg.to_string_lossy()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_no_arguments() {
        parse_args([OsString::from("boot-validator")]).unwrap();
    }

    #[test]
    fn rejects_any_argument() {
        let err =
            parse_args([OsString::from("boot-validator"), OsString::from("now")]).unwrap_err();
        assert!(err.contains("unexpected argument"));
    }
}

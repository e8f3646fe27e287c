//! The long-running update daemon.
//!
//! Configuration comes from the environment at startup: `UPDATE_SERVER`
//! (base URL) and `CHECK_INTERVAL` (seconds). Runs until killed.

use std::ffi::OsString;
use std::io::Write;

use seesaw_cli::{init_tracing, report_error};
use seesaw_core::HostSystem;
use seesaw_daemon::{HttpFetcher, UpdateDaemon};
use seesaw_state::FileStateStore;
use seesaw_types::{DeviceLayout, UpdateConfig};
use seesaw_verify::UpdateKey;

fn main() {
    init_tracing();
    let code = run(std::env::args_os(), &mut std::io::stderr());
    std::process::exit(code);
}

fn run<I, E>(args: I, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    E: Write,
{
    if let Err(message) = parse_args(args) {
        let _ = writeln!(err, "error: {message}");
        let _ = writeln!(err, "usage: update-daemon");
        return 2;
    }

    let config = match UpdateConfig::from_env() {
        Ok(config) => config,
        Err(error) => return report_error(err, &error.into()),
    };
    let key = match UpdateKey::from_pem_file(&config.public_key_path) {
        Ok(key) => key,
        Err(error) => return report_error(err, &error),
    };
    let fetcher = match HttpFetcher::new(config.http_timeout) {
        Ok(fetcher) => fetcher,
        Err(error) => return report_error(err, &error),
    };

    tracing::info!(
        target: "seesaw.daemon",
        server = %config.update_server,
        interval_secs = config.check_interval.as_secs(),
        "update daemon starting"
    );

    let layout = DeviceLayout::default();
    let store = FileStateStore::new(layout.clone());
    let host = HostSystem::new();
    UpdateDaemon::new(&store, &host, &layout, &config, &fetcher, &key).run_forever()
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
            "unexpected argument '{}' (configuration is via UPDATE_SERVER and CHECK_INTERVAL)",
            arg.to_string_lossy()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_no_arguments() {
        parse_args([OsString::from("update-daemon")]).unwrap();
    }

    #[test]
    fn rejects_arguments_and_names_the_env_vars() {
        let err =
            parse_args([OsString::from("update-daemon"), OsString::from("--now")]).unwrap_err();
        assert!(err.contains("UPDATE_SERVER"));
    }
}

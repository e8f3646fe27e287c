//! Manual installation entry point.
//!
//! `install-update <artifact-path> <version>` expects the detached
//! signature next to the artifact as `<artifact-path>.sig`, verifies it
//! against the device's fixed public key, and installs. On success the
//! device reboots into the new slot.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use seesaw_cli::{init_tracing, report_error};
use seesaw_core::{HostSystem, Installer};
use seesaw_error::{Result, SeesawError};
use seesaw_state::{FileStateStore, StateStore};
use seesaw_types::{DeviceLayout, SystemVersion, UpdateConfig};
use seesaw_verify::UpdateKey;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    Help,
    Install {
        artifact: PathBuf,
        version: SystemVersion,
    },
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
    let invocation = match parse_args(args) {
        Ok(invocation) => invocation,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };
    let (artifact, version) = match invocation {
        Invocation::Help => {
            let _ = write_usage(out);
            return 0;
        }
        Invocation::Install { artifact, version } => (artifact, version),
    };

    match install(&artifact, &version, out) {
        Ok(()) => {
            let _ = writeln!(out, "update installed; rebooting");
            0
        }
        Err(error) => report_error(err, &error),
    }
}

fn install<W: Write>(artifact: &Path, version: &SystemVersion, out: &mut W) -> Result<()> {
    let config = UpdateConfig::from_env()?;
    let layout = DeviceLayout::default();

    let _ = writeln!(out, "verifying signature of '{}'", artifact.display());
    let key = UpdateKey::from_pem_file(&config.public_key_path)?;
    let payload = std::fs::read(artifact)?;
    let signature_path = signature_path_for(artifact);
    let signature =
        std::fs::read(&signature_path).map_err(|_| SeesawError::DownloadFailed {
            url: signature_path.display().to_string(),
            detail: "detached signature file missing".to_owned(),
        })?;
    key.verify(&payload, &signature)?;
    let _ = writeln!(out, "signature OK");

    let store = FileStateStore::new(layout.clone());
    let host = HostSystem::new();
    let target = store.read_active_slot().other();
    let _ = writeln!(out, "installing version {version} into slot {target}");
    Installer::new(&store, &host, &layout).install(artifact, version)
}

fn signature_path_for(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".sig");
    PathBuf::from(name)
}

fn parse_args<I>(args: I) -> std::result::Result<Invocation, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let mut positional: Vec<String> = Vec::new();
    for arg in iter {
        let arg = arg.to_string_lossy().into_owned();
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            _ => positional.push(arg),
        }
    }

    match positional.as_slice() {
        [artifact, version] => Ok(Invocation::Install {
            artifact: PathBuf::from(artifact),
            version: version
                .parse()
                .map_err(|e| format!("bad version '{version}': {e}"))?,
        }),
        _ => Err(format!(
            "expected <artifact-path> <version>, got {} arguments",
            positional.len()
        )),
    }
}

fn write_usage<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "usage: install-update <artifact-path> <version>")?;
    writeln!(out)?;
    writeln!(out, "Verify '<artifact-path>.sig' against the device key,")?;
    writeln!(out, "install the artifact into the inactive slot, activate")?;
    writeln!(out, "it, and reboot.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Invocation, String> {
        let mut full = vec![OsString::from("install-update")];
        full.extend(args.iter().map(OsString::from));
        parse_args(full)
    }

    #[test]
    fn parses_artifact_and_version() {
        let parsed = parse(&["/tmp/u.tar.gz", "2024.02.01"]).unwrap();
        assert_eq!(
            parsed,
            Invocation::Install {
                artifact: PathBuf::from("/tmp/u.tar.gz"),
                version: "2024.02.01".parse().unwrap(),
            }
        );
    }

    #[test]
    fn rejects_wrong_arity_and_bad_versions() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["only-artifact"]).is_err());
        assert!(parse(&["a", "b", "c"]).is_err());
        assert!(parse(&["/tmp/u.tar.gz", "has space"]).is_err());
    }

    #[test]
    fn help_is_recognized_anywhere() {
        assert_eq!(parse(&["--help"]).unwrap(), Invocation::Help);
        assert_eq!(parse(&["/tmp/u.tar.gz", "-h"]).unwrap(), Invocation::Help);
    }

    #[test]
    fn signature_path_appends_sig() {
        assert_eq!(
            signature_path_for(Path::new("/tmp/u.tar.gz")),
            PathBuf::from("/tmp/u.tar.gz.sig")
        );
    }

    #[test]
    fn bad_arguments_exit_2_with_usage() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run([OsString::from("install-update")], &mut out, &mut err);
        assert_eq!(code, 2);
        assert!(String::from_utf8(err).unwrap().contains("usage:"));
    }
}

//! Version marker files.
//!
//! Each slot's filesystem carries a one-line marker recording the installed
//! version. The marker doubles as the bootability check: a slot without a
//! readable marker is not a valid activation target.

use std::fs;
use std::path::Path;

use seesaw_error::Result;
use seesaw_types::{DeviceLayout, SystemVersion};

use crate::atomic;

/// Read the version marker inside a mounted slot tree rooted at
/// `slot_root`. `None` when the marker is missing or not a usable version
/// string.
#[must_use]
pub fn read_in_root(layout: &DeviceLayout, slot_root: &Path) -> Option<SystemVersion> {
    read_marker_file(&layout.version_marker_in(slot_root))
}

/// Read the running system's version marker. `None` when missing or
/// unusable, which the daemon treats as "any advertised version is new".
#[must_use]
pub fn read_running(layout: &DeviceLayout) -> Option<SystemVersion> {
    read_marker_file(&layout.running_version_marker)
}

/// Write `version` into the marker file of the slot tree at `slot_root`,
/// creating parent directories as needed. Atomic whole-file replacement.
pub fn write_in_root(
    layout: &DeviceLayout,
    slot_root: &Path,
    version: &SystemVersion,
) -> Result<()> {
    let path = layout.version_marker_in(slot_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = version.as_str().to_owned();
    content.push('\n');
    atomic::replace_file(&path, content.as_bytes())?;
    Ok(())
}

fn read_marker_file(path: &Path) -> Option<SystemVersion> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return None,
    };
    match content.parse() {
        Ok(version) => Some(version),
        Err(err) => {
            tracing::warn!(
                target: "seesaw.store",
                path = %path.display(),
                error = %err,
                "ignoring unusable version marker"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_and_root() -> (DeviceLayout, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (DeviceLayout::rooted_at(dir.path()), dir)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (layout, dir) = layout_and_root();
        let root = dir.path().join("slot");
        let version: SystemVersion = "2024.02.01".parse().unwrap();

        write_in_root(&layout, &root, &version).unwrap();
        assert_eq!(read_in_root(&layout, &root), Some(version));
    }

    #[test]
    fn missing_marker_reads_none() {
        let (layout, dir) = layout_and_root();
        assert_eq!(read_in_root(&layout, &dir.path().join("empty")), None);
    }

    #[test]
    fn garbage_marker_reads_none() {
        let (layout, dir) = layout_and_root();
        let root = dir.path().join("slot");
        let path = layout.version_marker_in(&root);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "one two\n").unwrap();
        assert_eq!(read_in_root(&layout, &root), None);
    }

    #[test]
    fn running_marker_reads_from_layout_path() {
        let (layout, _dir) = layout_and_root();
        std::fs::create_dir_all(layout.running_version_marker.parent().unwrap()).unwrap();
        std::fs::write(&layout.running_version_marker, "2024.01.15\n").unwrap();
        assert_eq!(
            read_running(&layout),
            Some("2024.01.15".parse().unwrap())
        );
    }
}

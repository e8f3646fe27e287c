//! Mount table rewriting inside a freshly extracted slot tree.
//!
//! Update archives are built against one slot and may still reference the
//! other slot's block device in their `etc/fstab`. After extraction the
//! installer rewrites any device field naming either slot so the tree
//! mounts its own partition. Comments, blank lines, spacing, and lines
//! that do not start with a slot device pass through byte for byte.

use std::fs;
use std::path::Path;

use seesaw_error::Result;
use seesaw_types::{DeviceLayout, Slot};

use seesaw_state::atomic;

/// `content` with every slot-device first field rewritten to `target`'s
/// device.
#[must_use]
pub fn rewrite(content: &str, layout: &DeviceLayout, target: Slot) -> String {
    let target_device = layout.device(target);
    let mut out = String::with_capacity(content.len());
    for segment in split_keeping_newlines(content) {
        match segment {
            Segment::Line(line) => out.push_str(&rewrite_line(line, layout, target_device)),
            Segment::Newline(nl) => out.push_str(nl),
        }
    }
    out
}

/// Apply [`rewrite`] to the fstab inside the slot tree at `slot_root`,
/// atomically. A tree without an fstab is left alone; minimal images omit
/// it and mount from the kernel command line only.
pub fn rewrite_in_root(layout: &DeviceLayout, slot_root: &Path, target: Slot) -> Result<()> {
    let path = slot_root.join(&layout.fstab_rel);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    let rewritten = rewrite(&content, layout, target);
    if rewritten != content {
        atomic::replace_file(&path, rewritten.as_bytes())?;
        tracing::info!(
            target: "seesaw.install",
            path = %path.display(),
            slot = %target,
            "fstab device references rewritten"
        );
    }
    Ok(())
}

fn rewrite_line(line: &str, layout: &DeviceLayout, target_device: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return line.to_owned();
    }
    // First whitespace-delimited field is the device.
    let field_start = line.len() - trimmed.len();
    let field_end = field_start
        + trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
    let device = &line[field_start..field_end];
    if layout.slot_for_device(device).is_none() {
        return line.to_owned();
    }
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[..field_start]);
    out.push_str(target_device);
    out.push_str(&line[field_end..]);
    out
}

enum Segment<'a> {
    Line(&'a str),
    Newline(&'a str),
}

fn split_keeping_newlines(content: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = content;
    while let Some(pos) = rest.find('\n') {
        segments.push(Segment::Line(&rest[..pos]));
        segments.push(Segment::Newline(&rest[pos..=pos]));
        rest = &rest[pos + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Line(rest));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const FSTAB: &str = "\
# static file system information
proc            /proc  proc  defaults  0  0
/dev/mmcblk0p1  /boot  vfat  defaults  0  2
/dev/mmcblk0p2  /      ext4  defaults,noatime  0  1
/dev/mmcblk0p4  /data  ext4  defaults,noatime  0  2
";

    fn layout() -> DeviceLayout {
        DeviceLayout::default()
    }

    #[test]
    fn rewrites_own_and_other_slot_root_lines() {
        let out = rewrite(FSTAB, &layout(), Slot::B);
        assert!(out.contains("/dev/mmcblk0p3  /      ext4"));
        assert!(!out.contains("/dev/mmcblk0p2"));
    }

    #[test]
    fn leaves_non_slot_devices_alone() {
        let out = rewrite(FSTAB, &layout(), Slot::B);
        assert!(out.contains("/dev/mmcblk0p1  /boot"));
        assert!(out.contains("/dev/mmcblk0p4  /data"));
        assert!(out.contains("proc            /proc"));
    }

    #[test]
    fn preserves_comments_and_layout() {
        let out = rewrite(FSTAB, &layout(), Slot::B);
        assert!(out.starts_with("# static file system information\n"));
        assert_eq!(out.lines().count(), FSTAB.lines().count());
    }

    #[test]
    fn rewriting_to_slot_a_from_b_built_archive() {
        let content = "/dev/mmcblk0p3  /  ext4  defaults  0  1\n";
        let out = rewrite(content, &layout(), Slot::A);
        assert_eq!(out, "/dev/mmcblk0p2  /  ext4  defaults  0  1\n");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite(FSTAB, &layout(), Slot::B);
        assert_eq!(rewrite(&once, &layout(), Slot::B), once);
    }

    #[test]
    fn missing_fstab_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        rewrite_in_root(&layout(), dir.path(), Slot::B).unwrap();
    }

    #[test]
    fn rewrite_in_root_applies_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DeviceLayout::rooted_at(dir.path());
        let root = dir.path().join("slot");
        let path = root.join(&layout.fstab_rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "/dev/mmcblk0p2 / ext4 defaults 0 1\n").unwrap();

        rewrite_in_root(&layout, &root, Slot::B).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "/dev/mmcblk0p3 / ext4 defaults 0 1\n");
    }
}

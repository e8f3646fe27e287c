//! Small filesystem helpers shared by the switcher and installer.

use std::fs;
use std::path::Path;

use seesaw_error::Result;

/// Recursively copy `src` into `dst`, preserving regular file contents and
/// directory structure. `dst` is created if absent. Symlinks are recreated
/// as symlinks pointing at the same target.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&from, &to)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&from)?;
            if to.symlink_metadata().is_ok() {
                fs::remove_file(&to)?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(&target, &to)?;
            #[cfg(not(unix))]
            let _ = target;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

/// Remove every entry inside `dir` without removing `dir` itself. Used to
/// wipe a mounted slot filesystem: the mount point must survive.
pub fn wipe_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

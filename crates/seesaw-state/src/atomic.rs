//! Whole-file atomic replacement.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace the contents of `path` with `bytes` atomically with respect to
/// power loss: the bytes are written to a temporary file in the same
/// directory, synced, and renamed over the target. A reader (or the next
/// boot) sees either the complete old content or the complete new content.
pub fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' has no parent directory", path.display()),
        )
    })?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // The rename itself must survive power loss, so sync the directory too.
    File::open(dir)?.sync_all()?;
    Ok(())
}

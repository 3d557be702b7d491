//! Crash-safe single-file writes.
//!
//! Content goes to a sibling `<path>.tmp` first and is then renamed over the
//! target, so a reader of `path` sees either the old bytes or the new bytes,
//! never a torn file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The sibling temp path used while writing `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Atomically replace (or create) `path` with `content`.
///
/// On failure the file at `path` is left untouched and the temp file is
/// removed on a best-effort basis.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp = temp_path_for(path);

    if let Err(e) = write_temp(&tmp, content) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    // std::fs::rename replaces an existing target on every supported platform
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    Ok(())
}

fn write_temp(tmp: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(content)?;
    file.sync_all()
}

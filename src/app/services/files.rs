//! Opening, saving and renaming documents on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::app::domain::document::Document;
use crate::app::infrastructure::atomic_write::write_atomic;
use crate::app::infrastructure::error::{AppError, Result};

/// Read a file for opening. Any read failure is reported as `NotFound`.
pub fn read_document_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| AppError::NotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically write the document to `path` and record the save.
///
/// On failure the document keeps its previous path and modified flag.
pub fn save_document(doc: &mut Document, path: &Path) -> Result<()> {
    write_atomic(path, doc.content().as_bytes())?;
    doc.mark_saved(path);
    log::info!("Saved {}", path.display());
    Ok(())
}

/// True when both paths exist and name the same file on disk.
#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Rename a saved document's file to `new_path`.
///
/// Unsaved edits are first flushed to the current path so the moved file
/// carries the latest content. After a successful rename the document points
/// at `new_path` and is no longer modified.
pub fn rename_document(doc: &mut Document, new_path: &Path) -> Result<()> {
    let old_path: PathBuf = doc
        .file_path()
        .ok_or_else(|| {
            AppError::InvalidOperation("an unsaved document must be saved before renaming".to_string())
        })?
        .to_path_buf();

    if old_path == new_path {
        return Ok(());
    }

    // On a case-insensitive filesystem a case-only rename "finds" the file itself
    if new_path.exists() && !is_same_file(&old_path, new_path) {
        return Err(AppError::InvalidOperation(format!(
            "{} already exists",
            new_path.display()
        )));
    }

    if doc.is_modified() {
        write_atomic(&old_path, doc.content().as_bytes())?;
    }

    fs::rename(&old_path, new_path)?;
    doc.mark_saved(new_path);
    log::info!("Renamed {} to {}", old_path.display(), new_path.display());
    Ok(())
}

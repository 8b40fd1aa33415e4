//! Database file persistence
//!
//! Uses atomic writes (write to temp file, then rename) so a crash while
//! saving never leaves a truncated archive behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{StorageError, StorageResult};

/// Read the database text
///
/// Returns `None` if the file doesn't exist yet.
pub fn read_database(path: &Path) -> StorageResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).map_err(|e| StorageError::from_read(e, path.to_path_buf()))?;
    debug!("Read {} bytes from {:?}", content.len(), path);
    Ok(Some(content))
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    // Same directory, so the rename stays on one filesystem
    let temp_path = temp_path_for(path);

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    let written = file.write_all(data).and_then(|_| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::from_io(e, temp_path));
    }
    drop(file);

    if let Err(source) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::AtomicWriteFailed {
            from: temp_path,
            to: path.to_path_buf(),
            source,
        });
    }

    debug!("Committed {} bytes to {:?}", data.len(), path);
    Ok(())
}

/// Sibling lock file for a database path
pub fn lock_path_for(path: &Path) -> PathBuf {
    with_suffix(path, ".lock")
}

fn temp_path_for(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

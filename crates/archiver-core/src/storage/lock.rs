//! Advisory database lock
//!
//! One process at a time may hold an archive between load and close. The
//! lock is an exclusive `flock`-style lock on a sibling `.lock` file; waiting
//! is bounded so a stuck writer surfaces as an error instead of a hang.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;
use tracing::debug;

use super::error::{StorageError, StorageResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An exclusive lock, released on drop
#[derive(Debug)]
pub struct ArchiveLock {
    file: File,
    path: PathBuf,
}

impl ArchiveLock {
    /// Acquire the lock, polling until `timeout` elapses
    pub fn acquire(path: &Path, timeout: Duration) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Acquired lock {:?} after {:?}", path, started.elapsed());
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    if started.elapsed() >= timeout {
                        return Err(StorageError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout));
                }
                Err(e) => return Err(StorageError::from_io(e, path.to_path_buf())),
            }
        }
    }
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released lock {:?}", self.path);
    }
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == ErrorKind::WouldBlock
        || error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("archive.xml.lock");

        let lock = ArchiveLock::acquire(&path, Duration::from_millis(100)).unwrap();
        assert!(path.exists());
        drop(lock);

        // Free again after release
        ArchiveLock::acquire(&path, Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn test_second_holder_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("archive.xml.lock");

        let _held = ArchiveLock::acquire(&path, Duration::from_millis(100)).unwrap();
        let err = ArchiveLock::acquire(&path, Duration::from_millis(120)).unwrap_err();

        assert!(matches!(err, StorageError::LockTimeout { .. }));
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("archive.xml.lock");

        ArchiveLock::acquire(&path, Duration::from_millis(100)).unwrap();
        assert!(path.exists());
    }
}

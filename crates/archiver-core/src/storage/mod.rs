//! Storage layer
//!
//! Handles the on-disk side of the archive: reading the database file,
//! committing it atomically and holding the advisory lock for a session.
//!
//! ## Files
//!
//! - `archive.xml` - the archive database
//! - `archive.xml.tmp` - staging file for the atomic rename, never left behind
//! - `archive.xml.lock` - advisory lock held from load until close

pub mod error;
pub mod lock;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use lock::ArchiveLock;
pub use persistence::{atomic_write, lock_path_for, read_database};

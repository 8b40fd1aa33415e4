//! Archive error taxonomy
//!
//! Every failure crossing the archive/location boundary is a value of
//! [`ArchiveError`]. [`ArchiveError::kind`] groups them so callers can tell
//! an invalid request from a missing target from damaged storage.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::ValueKind;
use crate::storage::StorageError;
use crate::xml::XmlError;

/// Errors produced by archive and location operations
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Location already exists: {0}")]
    LocationExists(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Parent location not found: {0}")]
    ParentNotFound(String),

    #[error("Setting parent of '{location}' to '{parent}' would create a cycle")]
    ParentCycle { location: String, parent: String },

    #[error("Location '{location}' is in use: {reason}")]
    LocationInUse { location: String, reason: &'static str },

    #[error("The default location cannot be {0}")]
    DefaultLocation(&'static str),

    #[error("Invalid location id: {0:?}")]
    InvalidLocationId(String),

    #[error("Backend '{backend}' is already registered{scope}")]
    DuplicateBackend { backend: String, scope: String },

    #[error("Backend '{backend}' is not registered{scope}")]
    BackendNotRegistered { backend: String, scope: String },

    #[error("Invalid key path: {0:?}")]
    InvalidPath(String),

    #[error("Key path appears more than once in one store: {0}")]
    DuplicatePath(String),

    #[error("Type mismatch at '{path}': entry holds {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Timestamp {timestamp} for '{path}' is earlier than its latest revision ({head})")]
    NonMonotonicTimestamp {
        path: String,
        timestamp: DateTime<Utc>,
        head: DateTime<Utc>,
    },

    #[error("No rollback criteria given: need a date, --last, --steps or a revision id")]
    NoRollbackCriteria,

    #[error("No revision of '{0}' satisfies the rollback criteria")]
    UnresolvedEntry(String),

    #[error("Archive document is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Broad classification of an [`ArchiveError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request breaks an invariant or is missing required input
    Invalid,
    /// The named location, parent or backend does not exist
    NotFound,
    /// The database could not be read, parsed or written
    Storage,
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::LocationNotFound(_)
            | ArchiveError::ParentNotFound(_)
            | ArchiveError::BackendNotRegistered { .. }
            | ArchiveError::UnresolvedEntry(_) => ErrorKind::NotFound,
            ArchiveError::Corrupt(_) | ArchiveError::Xml(_) | ArchiveError::Storage(_) => {
                ErrorKind::Storage
            }
            _ => ErrorKind::Invalid,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ArchiveError::LocationExists("work".into()).kind(),
            ErrorKind::Invalid
        );
        assert_eq!(ArchiveError::NoRollbackCriteria.kind(), ErrorKind::Invalid);
        assert!(ArchiveError::LocationNotFound("x".into()).is_not_found());
        assert_eq!(
            ArchiveError::Corrupt("bad".into()).kind(),
            ErrorKind::Storage
        );

        let storage = StorageError::NotFound {
            path: PathBuf::from("/x"),
        };
        assert_eq!(ArchiveError::from(storage).kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_error_display() {
        let err = ArchiveError::ParentCycle {
            location: "a".into(),
            parent: "b".into(),
        };
        assert_eq!(
            err.to_string(),
            "Setting parent of 'a' to 'b' would create a cycle"
        );

        let err = ArchiveError::TypeMismatch {
            path: "/bg/color1".into(),
            expected: ValueKind::String,
            found: ValueKind::Int,
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch at '/bg/color1': entry holds string, got int"
        );
    }

    #[test]
    fn test_backend_scope_display() {
        let err = ArchiveError::DuplicateBackend {
            backend: "bg".into(),
            scope: " in location 'default'".into(),
        };
        assert_eq!(
            err.to_string(),
            "Backend 'bg' is already registered in location 'default'"
        );
    }
}

//! Locations
//!
//! A location is a named configuration profile. It owns the directory tree
//! of values stored directly at it and the set of backends registered to
//! it. Links to the parent location are by id; the [`crate::Archive`] owns
//! every location and resolves those links.

use serde::Serialize;

use crate::error::{ArchiveError, ArchiveResult};
use crate::models::ConfigEntry;
use crate::tree::DirTree;

/// Id of the location every archive starts with
pub const DEFAULT_LOCATION: &str = "default";

/// A named configuration profile
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub(crate) id: String,
    pub(crate) parent: Option<String>,
    pub(crate) tree: DirTree,
    pub(crate) backends: Vec<String>,
}

/// Serializable overview of a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationSummary {
    pub id: String,
    pub parent: Option<String>,
    pub backends: Vec<String>,
    pub entries: usize,
    pub current: bool,
}

impl Location {
    pub(crate) fn new(id: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            id: id.into(),
            parent,
            tree: DirTree::new(),
            backends: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_LOCATION
    }

    /// Values stored directly at this location
    pub fn tree(&self) -> &DirTree {
        &self.tree
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    pub fn contains_backend(&self, backend: &str) -> bool {
        self.backends.iter().any(|b| b == backend)
    }

    /// Entry stored at this location only; ancestors are not consulted
    pub fn lookup(&self, path: &str) -> Option<&ConfigEntry> {
        self.tree.lookup(path)
    }

    pub(crate) fn add_backend(&mut self, backend: &str) -> ArchiveResult<()> {
        validate_backend(backend)?;
        if self.contains_backend(backend) {
            return Err(ArchiveError::DuplicateBackend {
                backend: backend.to_string(),
                scope: format!(" in location '{}'", self.id),
            });
        }
        self.backends.push(backend.to_string());
        Ok(())
    }

    pub(crate) fn remove_backend(&mut self, backend: &str) -> ArchiveResult<()> {
        let index = self
            .backends
            .iter()
            .position(|b| b == backend)
            .ok_or_else(|| ArchiveError::BackendNotRegistered {
                backend: backend.to_string(),
                scope: format!(" in location '{}'", self.id),
            })?;
        self.backends.remove(index);
        Ok(())
    }

    pub(crate) fn summary(&self, current: bool) -> LocationSummary {
        LocationSummary {
            id: self.id.clone(),
            parent: self.parent.clone(),
            backends: self.backends.clone(),
            entries: self.tree.entry_count(),
            current,
        }
    }
}

/// Location ids must be non-empty, without surrounding whitespace or `/`
pub(crate) fn validate_location_id(id: &str) -> ArchiveResult<()> {
    if id.is_empty() || id.trim() != id || id.contains('/') {
        return Err(ArchiveError::InvalidLocationId(id.to_string()));
    }
    Ok(())
}

/// Backend ids become the first path segment, so they share the path rules
pub(crate) fn validate_backend(backend: &str) -> ArchiveResult<()> {
    if backend.is_empty() || backend.contains('/') {
        return Err(ArchiveError::InvalidPath(backend.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_set_rejects_duplicates() {
        let mut location = Location::new("work", Some(DEFAULT_LOCATION.to_string()));
        location.add_backend("bg").unwrap();

        let err = location.add_backend("bg").unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateBackend { .. }));
        assert_eq!(location.backends(), &["bg".to_string()]);
    }

    #[test]
    fn test_remove_backend() {
        let mut location = Location::new(DEFAULT_LOCATION, None);
        location.add_backend("bg").unwrap();
        location.add_backend("kbd").unwrap();

        location.remove_backend("bg").unwrap();
        assert!(!location.contains_backend("bg"));
        assert!(location.contains_backend("kbd"));

        let err = location.remove_backend("bg").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_backend_ids() {
        let mut location = Location::new(DEFAULT_LOCATION, None);
        assert!(location.add_backend("").is_err());
        assert!(location.add_backend("a/b").is_err());
    }

    #[test]
    fn test_location_id_rules() {
        assert!(validate_location_id("work").is_ok());
        assert!(validate_location_id("home office").is_ok());
        assert!(validate_location_id("").is_err());
        assert!(validate_location_id(" padded").is_err());
        assert!(validate_location_id("a/b").is_err());
    }

    #[test]
    fn test_summary() {
        let mut location = Location::new("work", Some(DEFAULT_LOCATION.to_string()));
        location.add_backend("bg").unwrap();

        let summary = location.summary(true);
        assert_eq!(summary.id, "work");
        assert_eq!(summary.parent.as_deref(), Some("default"));
        assert_eq!(summary.entries, 0);
        assert!(summary.current);
        assert!(!location.is_default());
    }
}

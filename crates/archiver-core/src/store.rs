//! Storage capability interface
//!
//! `ConfigStore` is the narrow surface a settings front end needs: read a
//! value, write a value, roll back, enumerate profiles. [`Archive`]
//! implements it; an IPC or RPC adapter can expose it without knowing about
//! files, locks or XML.

use chrono::Utc;

use crate::archive::{Archive, RollbackReport, RollbackRequest};
use crate::error::ArchiveResult;
use crate::location::LocationSummary;
use crate::models::{StoreMask, Value};

pub trait ConfigStore {
    /// Effective value at `path`, including inherited values
    fn get(&self, location: &str, path: &str) -> ArchiveResult<Option<Value>>;

    /// Store one value now, retiring the previous revision
    ///
    /// Returns the revision id of the write.
    fn store(&mut self, location: &str, path: &str, value: Value) -> ArchiveResult<u64>;

    fn rollback(
        &mut self,
        location: &str,
        request: &RollbackRequest,
    ) -> ArchiveResult<RollbackReport>;

    fn list_locations(&self) -> Vec<LocationSummary>;
}

impl ConfigStore for Archive {
    fn get(&self, location: &str, path: &str) -> ArchiveResult<Option<Value>> {
        Ok(Archive::get(self, location, path)?.cloned())
    }

    fn store(&mut self, location: &str, path: &str, value: Value) -> ArchiveResult<u64> {
        self.store_value(location, path, value, Utc::now(), StoreMask::Previous)
    }

    fn rollback(
        &mut self,
        location: &str,
        request: &RollbackRequest,
    ) -> ArchiveResult<RollbackReport> {
        Archive::rollback(self, location, request, Utc::now())
    }

    fn list_locations(&self) -> Vec<LocationSummary> {
        Archive::list_locations(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::DEFAULT_LOCATION;
    use crate::revision::RollbackTarget;

    fn set_and_undo(store: &mut dyn ConfigStore) -> Option<Value> {
        store.store(DEFAULT_LOCATION, "/bg/color1", "a".into()).unwrap();
        store.store(DEFAULT_LOCATION, "/bg/color1", "b".into()).unwrap();
        store
            .rollback(DEFAULT_LOCATION, &RollbackRequest::new(RollbackTarget::Last))
            .unwrap();
        store.get(DEFAULT_LOCATION, "/bg/color1").unwrap()
    }

    #[test]
    fn test_archive_through_trait_object() {
        let mut archive = Archive::new();
        assert_eq!(set_and_undo(&mut archive), Some(Value::from("a")));

        let store: &dyn ConfigStore = &archive;
        let locations = store.list_locations();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].entries, 1);
        assert!(locations[0].current);
    }

    #[test]
    fn test_trait_get_missing_location() {
        let archive = Archive::new();
        let err = ConfigStore::get(&archive, "nowhere", "/bg/x").unwrap_err();
        assert!(err.is_not_found());
    }
}

//! The archive
//!
//! `Archive` owns every location, the current-location pointer, the
//! archive-wide backend set and the on-disk database. It is the main entry
//! point of the crate.
//!
//! ## Lifecycle
//!
//! ```ignore
//! let mut archive = Archive::load(&config, false)?; // lock + read (or create)
//! archive.store_xml("default", "bg", &xml, Utc::now(), StoreMask::Previous)?;
//! archive.close()?;                                  // atomic write + unlock
//! ```
//!
//! Dropping an archive without calling [`Archive::close`] releases the lock
//! and discards unsaved changes.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, RollbackPolicy};
use crate::document::{decode_archive, decode_snapshot, encode_archive, encode_snapshot};
use crate::error::{ArchiveError, ArchiveResult};
use crate::location::{
    validate_backend, validate_location_id, Location, LocationSummary, DEFAULT_LOCATION,
};
use crate::models::{ConfigEntry, StoreMask, Value};
use crate::revision::RollbackTarget;
use crate::storage::{atomic_write, lock_path_for, read_database, ArchiveLock, StorageError};
use crate::tree::split_path;
use crate::xml::Element;

/// A rollback request against one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackRequest {
    pub target: RollbackTarget,
    /// Restrict to one backend; `None` covers every backend
    pub backend: Option<String>,
    /// Also resolve through inherited parent scopes
    pub recursive: bool,
}

impl RollbackRequest {
    pub fn new(target: RollbackTarget) -> Self {
        Self {
            target,
            backend: None,
            recursive: false,
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Outcome of a rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    /// Revision id shared by every applied entry; `None` if nothing applied
    pub revision_id: Option<u64>,
    pub applied: Vec<String>,
    /// Paths with no revision matching the target
    pub skipped: Vec<String>,
}

/// Outcome of storing a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub location: String,
    pub backend: String,
    pub revision_id: Option<u64>,
    pub stored: usize,
}

/// Resolved rollback, computed without touching the archive
struct RollbackPlan {
    resolved: Vec<(String, Value)>,
    /// Paths left alone, with their current effective value and the reason
    skipped: Vec<(String, Value, ArchiveError)>,
}

/// Versioned, location-scoped configuration database
#[derive(Debug)]
pub struct Archive {
    path: Option<PathBuf>,
    locations: Vec<Location>,
    current: String,
    master_backends: Vec<String>,
    next_revision: u64,
    policy: RollbackPolicy,
    dirty: bool,
    lock: Option<ArchiveLock>,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// An in-memory archive holding only the default location
    pub fn new() -> Self {
        Self {
            path: None,
            locations: vec![Location::new(DEFAULT_LOCATION, None)],
            current: DEFAULT_LOCATION.to_string(),
            master_backends: Vec::new(),
            next_revision: 1,
            policy: RollbackPolicy::default(),
            dirty: false,
            lock: None,
        }
    }

    // ==================== Lifecycle ====================

    /// Open the global or per-user database named by the configuration
    pub fn load(config: &Config, global: bool) -> ArchiveResult<Self> {
        let archive = Self::open_at(
            config.database_path(global),
            &config.lock_path(global),
            config.lock_timeout(),
        )?;
        Ok(archive.with_policy(config.rollback_policy))
    }

    /// Lock and read the database at `path`
    ///
    /// A missing file yields a fresh archive that is written on close. A file
    /// that cannot be parsed is reported as [`StorageError::InvalidFormat`].
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration) -> ArchiveResult<Self> {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self::open_at(path, &lock_path, lock_timeout)
    }

    fn open_at(path: PathBuf, lock_path: &Path, lock_timeout: Duration) -> ArchiveResult<Self> {
        let lock = ArchiveLock::acquire(lock_path, lock_timeout)?;

        let mut archive = match read_database(&path)? {
            Some(text) => Self::from_xml(&text).map_err(|e| StorageError::InvalidFormat {
                path: path.clone(),
                details: e.to_string(),
            })?,
            None => {
                info!("No archive at {:?}, starting a new one", path);
                let mut archive = Self::new();
                archive.dirty = true;
                archive
            }
        };

        debug!(
            "Opened archive {:?}: {} locations, current '{}'",
            path,
            archive.locations.len(),
            archive.current
        );
        archive.path = Some(path);
        archive.lock = Some(lock);
        Ok(archive)
    }

    /// Parse a database document into an in-memory archive
    pub fn from_xml(text: &str) -> ArchiveResult<Self> {
        let root = Element::parse(text)?;
        let decoded = decode_archive(&root)?;

        let mut archive = Self {
            locations: decoded.locations,
            master_backends: decoded.master_backends,
            next_revision: decoded.next_revision,
            ..Self::new()
        };

        match decoded.current {
            Some(id) if archive.get_location(&id).is_some() => archive.current = id,
            Some(id) => {
                warn!(
                    "Current location '{}' does not exist, falling back to '{}'",
                    id, DEFAULT_LOCATION
                );
                archive.dirty = true;
            }
            None => {}
        }
        Ok(archive)
    }

    /// Serialize the whole archive as a database document
    pub fn to_xml(&self) -> ArchiveResult<String> {
        let root = encode_archive(
            &self.locations,
            &self.current,
            &self.master_backends,
            self.next_revision,
        );
        Ok(root.to_document()?)
    }

    pub fn with_policy(mut self, policy: RollbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    /// Database file, `None` for an in-memory archive
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether there are changes not yet written
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Prune empty directories and atomically write the database
    pub fn flush(&mut self) -> ArchiveResult<()> {
        let pruned: usize = self
            .locations
            .iter_mut()
            .map(|l| l.tree.prune_empty())
            .sum();

        let Some(path) = self.path.clone() else {
            self.dirty = false;
            return Ok(());
        };

        let text = self.to_xml()?;
        atomic_write(&path, text.as_bytes())?;
        self.dirty = false;
        info!(
            "Saved archive {:?} ({} locations, {} empty directories pruned)",
            path,
            self.locations.len(),
            pruned
        );
        Ok(())
    }

    /// Write pending changes and release the lock
    pub fn close(mut self) -> ArchiveResult<()> {
        if self.dirty {
            self.flush()?;
        } else {
            debug!("Archive unchanged, nothing to write");
        }
        Ok(())
    }

    // ==================== Locations ====================

    pub fn get_location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Like [`Archive::get_location`], but absence is an error
    pub fn location(&self, id: &str) -> ArchiveResult<&Location> {
        self.get_location(id)
            .ok_or_else(|| ArchiveError::LocationNotFound(id.to_string()))
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn list_locations(&self) -> Vec<LocationSummary> {
        self.locations
            .iter()
            .map(|l| l.summary(l.id == self.current))
            .collect()
    }

    /// Locations whose parent is `id`
    pub fn children(&self, id: &str) -> Vec<&Location> {
        self.locations
            .iter()
            .filter(|l| l.parent_id() == Some(id))
            .collect()
    }

    /// The location followed by its parent chain, nearest first
    pub fn ancestors(&self, id: &str) -> ArchiveResult<Vec<&Location>> {
        let mut cursor = self.location(id)?;
        let mut chain = vec![cursor];
        while let Some(parent) = cursor.parent_id() {
            if chain.len() > self.locations.len() {
                return Err(ArchiveError::Corrupt(format!(
                    "parent chain of '{}' does not terminate",
                    id
                )));
            }
            cursor = self.location(parent)?;
            chain.push(cursor);
        }
        Ok(chain)
    }

    /// Create a location, optionally inheriting from `parent`
    pub fn new_location(&mut self, id: &str, parent: Option<&str>) -> ArchiveResult<&Location> {
        validate_location_id(id)?;
        if self.get_location(id).is_some() {
            return Err(ArchiveError::LocationExists(id.to_string()));
        }
        if let Some(parent) = parent {
            if self.get_location(parent).is_none() {
                return Err(ArchiveError::ParentNotFound(parent.to_string()));
            }
        }

        self.locations
            .push(Location::new(id, parent.map(str::to_string)));
        self.dirty = true;
        info!("Created location '{}' (parent: {:?})", id, parent);
        Ok(&self.locations[self.locations.len() - 1])
    }

    /// Change or clear the parent of a location
    ///
    /// Links are left untouched when the new parent is missing or would make
    /// the location its own ancestor.
    pub fn set_parent(&mut self, id: &str, parent: Option<&str>) -> ArchiveResult<()> {
        if id == DEFAULT_LOCATION {
            return Err(ArchiveError::DefaultLocation("reparented"));
        }
        let index = self.index_of(id)?;

        if let Some(parent) = parent {
            if self.get_location(parent).is_none() {
                return Err(ArchiveError::ParentNotFound(parent.to_string()));
            }
            if self.ancestors(parent)?.iter().any(|l| l.id == id) {
                return Err(ArchiveError::ParentCycle {
                    location: id.to_string(),
                    parent: parent.to_string(),
                });
            }
        }

        self.locations[index].parent = parent.map(str::to_string);
        self.dirty = true;
        info!("Set parent of '{}' to {:?}", id, parent);
        Ok(())
    }

    /// Rename a location, following child links and the current pointer
    pub fn rename_location(&mut self, id: &str, new_id: &str) -> ArchiveResult<()> {
        if id == DEFAULT_LOCATION {
            return Err(ArchiveError::DefaultLocation("renamed"));
        }
        validate_location_id(new_id)?;
        let index = self.index_of(id)?;
        if self.get_location(new_id).is_some() {
            return Err(ArchiveError::LocationExists(new_id.to_string()));
        }

        self.locations[index].id = new_id.to_string();
        for child in self
            .locations
            .iter_mut()
            .filter(|l| l.parent.as_deref() == Some(id))
        {
            child.parent = Some(new_id.to_string());
        }
        if self.current == id {
            self.current = new_id.to_string();
        }
        self.dirty = true;
        info!("Renamed location '{}' to '{}'", id, new_id);
        Ok(())
    }

    /// Delete a location and everything stored at it
    ///
    /// Refused for the default location, the current location and any
    /// location that still has children.
    pub fn remove_location(&mut self, id: &str) -> ArchiveResult<()> {
        if id == DEFAULT_LOCATION {
            return Err(ArchiveError::DefaultLocation("removed"));
        }
        let index = self.index_of(id)?;
        if self.current == id {
            return Err(ArchiveError::LocationInUse {
                location: id.to_string(),
                reason: "it is the current location",
            });
        }
        if !self.children(id).is_empty() {
            return Err(ArchiveError::LocationInUse {
                location: id.to_string(),
                reason: "it has child locations",
            });
        }

        let removed = self.locations.remove(index);
        self.dirty = true;
        info!(
            "Removed location '{}' ({} entries)",
            id,
            removed.tree.entry_count()
        );
        Ok(())
    }

    pub fn current_location_id(&self) -> &str {
        &self.current
    }

    pub fn current_location(&self) -> ArchiveResult<&Location> {
        self.location(&self.current)
    }

    /// Point the archive at another location; nothing is stored or rolled back
    pub fn set_current_location(&mut self, id: &str) -> ArchiveResult<()> {
        self.index_of(id)?;
        if self.current != id {
            info!("Current location: '{}' -> '{}'", self.current, id);
            self.current = id.to_string();
            self.dirty = true;
        }
        Ok(())
    }

    // ==================== Backends ====================

    pub fn add_backend(&mut self, location: &str, backend: &str) -> ArchiveResult<()> {
        let index = self.index_of(location)?;
        self.locations[index].add_backend(backend)?;
        self.dirty = true;
        info!("Added backend '{}' to location '{}'", backend, location);
        Ok(())
    }

    /// Unregister a backend; its stored history is kept
    pub fn remove_backend(&mut self, location: &str, backend: &str) -> ArchiveResult<()> {
        let index = self.index_of(location)?;
        self.locations[index].remove_backend(backend)?;
        self.dirty = true;
        info!("Removed backend '{}' from location '{}'", backend, location);
        Ok(())
    }

    /// Backends registered archive-wide rather than per location
    pub fn master_backends(&self) -> &[String] {
        &self.master_backends
    }

    pub fn add_master_backend(&mut self, backend: &str) -> ArchiveResult<()> {
        validate_backend(backend)?;
        if self.master_backends.iter().any(|b| b == backend) {
            return Err(ArchiveError::DuplicateBackend {
                backend: backend.to_string(),
                scope: " archive-wide".to_string(),
            });
        }
        self.master_backends.push(backend.to_string());
        self.dirty = true;
        info!("Added master backend '{}'", backend);
        Ok(())
    }

    pub fn remove_master_backend(&mut self, backend: &str) -> ArchiveResult<()> {
        let index = self
            .master_backends
            .iter()
            .position(|b| b == backend)
            .ok_or_else(|| ArchiveError::BackendNotRegistered {
                backend: backend.to_string(),
                scope: " archive-wide".to_string(),
            })?;
        self.master_backends.remove(index);
        self.dirty = true;
        info!("Removed master backend '{}'", backend);
        Ok(())
    }

    // ==================== Storing ====================

    /// Store a single value at `/<backend>/<key...>`
    ///
    /// Returns the revision id allocated for the write.
    pub fn store_value(
        &mut self,
        location: &str,
        path: &str,
        value: Value,
        timestamp: DateTime<Utc>,
        mask: StoreMask,
    ) -> ArchiveResult<u64> {
        let backend = backend_of(path)?.to_string();
        let index = self.index_of(location)?;
        self.locations[index]
            .tree
            .check_store(path, &value, timestamp)?;

        let id = self.allocate_revision();
        let target = &mut self.locations[index];
        target.tree.store(path, value, timestamp, id, mask)?;
        ensure_backend(target, &backend);
        self.dirty = true;
        debug!("Stored {} at '{}' (revision {})", path, location, id);
        Ok(id)
    }

    /// Store a set of values under one backend as a single operation
    ///
    /// Every write is validated before any is applied; all stored entries
    /// share one revision id.
    pub fn store_document(
        &mut self,
        location: &str,
        backend: &str,
        items: &[(String, Value)],
        timestamp: DateTime<Utc>,
        mask: StoreMask,
    ) -> ArchiveResult<StoreReport> {
        validate_backend(backend)?;
        let index = self.index_of(location)?;

        let mut seen = HashSet::new();
        for (path, value) in items {
            if backend_of(path)? != backend {
                return Err(ArchiveError::InvalidPath(path.clone()));
            }
            if !seen.insert(path.as_str()) {
                return Err(ArchiveError::DuplicatePath(path.clone()));
            }
            self.locations[index]
                .tree
                .check_store(path, value, timestamp)?;
        }

        let revision_id = if items.is_empty() {
            None
        } else {
            Some(self.allocate_revision())
        };

        let target = &mut self.locations[index];
        if let Some(id) = revision_id {
            for (path, value) in items {
                target.tree.store(path, value.clone(), timestamp, id, mask)?;
            }
        }
        ensure_backend(target, backend);
        self.dirty = true;

        info!(
            "Stored {} entries for backend '{}' at '{}' (revision {:?})",
            items.len(),
            backend,
            location,
            revision_id
        );
        Ok(StoreReport {
            location: location.to_string(),
            backend: backend.to_string(),
            revision_id,
            stored: items.len(),
        })
    }

    /// Parse a snapshot document and store it under `backend`
    pub fn store_xml(
        &mut self,
        location: &str,
        backend: &str,
        xml: &str,
        timestamp: DateTime<Utc>,
        mask: StoreMask,
    ) -> ArchiveResult<StoreReport> {
        let root = Element::parse(xml)?;
        if let Some(declared) = root.attr("backend") {
            if declared != backend {
                warn!(
                    "Document declares backend '{}', storing under '{}'",
                    declared, backend
                );
            }
        }
        let items = decode_snapshot(&root, backend)?;
        self.store_document(location, backend, &items, timestamp, mask)
    }

    // ==================== Reading ====================

    /// Effective value at `path`, inherited from the nearest scope holding it
    pub fn get(&self, location: &str, path: &str) -> ArchiveResult<Option<&Value>> {
        Ok(self
            .history(location, path)?
            .map(|(_, entry)| entry.current()))
    }

    /// The entry visible at `path` and the id of the location holding it
    pub fn history(
        &self,
        location: &str,
        path: &str,
    ) -> ArchiveResult<Option<(&str, &ConfigEntry)>> {
        split_path(path)?;
        Ok(self
            .ancestors(location)?
            .into_iter()
            .find_map(|scope| scope.lookup(path).map(|entry| (scope.id(), entry))))
    }

    /// Delete an entry and its history from one location
    pub fn purge(&mut self, location: &str, path: &str) -> ArchiveResult<bool> {
        let index = self.index_of(location)?;
        let purged = self.locations[index].tree.purge(path).is_some();
        if purged {
            self.dirty = true;
            info!("Purged '{}' from location '{}'", path, location);
        }
        Ok(purged)
    }

    /// Drop superseded history beyond `keep` revisions per entry
    pub fn trim_history(&mut self, location: &str, keep: usize) -> ArchiveResult<usize> {
        let index = self.index_of(location)?;
        let removed = self.locations[index].tree.trim_history(keep);
        if removed > 0 {
            self.dirty = true;
            info!(
                "Trimmed {} revisions from location '{}'",
                removed, location
            );
        }
        Ok(removed)
    }

    /// Current values as a snapshot document
    pub fn snapshot(
        &self,
        location: &str,
        backend: Option<&str>,
        recursive: bool,
    ) -> ArchiveResult<Element> {
        let scopes = self.scopes(location, recursive)?;
        let items: Vec<(String, Value)> = scope_paths(&scopes, backend)
            .into_iter()
            .filter_map(|path| {
                let value = effective(&scopes, &path)?.current().clone();
                Some((path, value))
            })
            .collect();
        Ok(encode_snapshot(backend, &items))
    }

    // ==================== Rollback ====================

    /// Re-apply historical values as new revisions
    ///
    /// Entries without a revision matching the target, or whose match has a
    /// different type than the location's own entry, are skipped under
    /// [`RollbackPolicy::BestEffort`]; under [`RollbackPolicy::Strict`] the
    /// first one aborts the rollback before anything is written.
    pub fn rollback(
        &mut self,
        location: &str,
        request: &RollbackRequest,
        now: DateTime<Utc>,
    ) -> ArchiveResult<RollbackReport> {
        let plan = self.plan_rollback(location, request)?;
        let index = self.index_of(location)?;
        for (path, value) in &plan.resolved {
            self.locations[index].tree.check_store(path, value, now)?;
        }

        let revision_id = if plan.resolved.is_empty() {
            None
        } else {
            Some(self.allocate_revision())
        };

        if let Some(id) = revision_id {
            let target = &mut self.locations[index];
            for (path, value) in &plan.resolved {
                target
                    .tree
                    .store(path, value.clone(), now, id, StoreMask::Previous)?;
                ensure_backend(target, backend_of(path)?);
            }
            self.dirty = true;
        }

        for (path, _, reason) in &plan.skipped {
            warn!("Skipped '{}': {}", path, reason);
        }
        info!(
            "Rolled back {} entries at '{}' (revision {:?}, {} skipped)",
            plan.resolved.len(),
            location,
            revision_id,
            plan.skipped.len()
        );

        Ok(RollbackReport {
            revision_id,
            applied: plan.resolved.into_iter().map(|(path, _)| path).collect(),
            skipped: plan.skipped.into_iter().map(|(path, _, _)| path).collect(),
        })
    }

    /// Write the state a rollback would produce, without changing anything
    ///
    /// The output equals [`Archive::snapshot`] of the same location, backend
    /// and recursion taken right after [`Archive::rollback`] with the same
    /// request.
    pub fn dump_rollback_data(
        &self,
        location: &str,
        request: &RollbackRequest,
        sink: &mut impl Write,
    ) -> ArchiveResult<()> {
        let plan = self.plan_rollback(location, request)?;
        let skipped = plan.skipped.into_iter().map(|(path, value, _)| (path, value));
        let items: Vec<(String, Value)> = plan.resolved.into_iter().chain(skipped).collect();
        let document = encode_snapshot(request.backend.as_deref(), &items).to_document()?;
        sink.write_all(document.as_bytes())
            .map_err(|e| ArchiveError::Storage(StorageError::Io(e)))?;
        Ok(())
    }

    fn plan_rollback(&self, location: &str, request: &RollbackRequest) -> ArchiveResult<RollbackPlan> {
        if let Some(backend) = &request.backend {
            validate_backend(backend)?;
        }
        let scopes = self.scopes(location, request.recursive)?;

        let mut plan = RollbackPlan {
            resolved: Vec::new(),
            skipped: Vec::new(),
        };
        for path in scope_paths(&scopes, request.backend.as_deref()) {
            let chain: Vec<&ConfigEntry> = scopes.iter().filter_map(|s| s.lookup(&path)).collect();
            let own = scopes.first().and_then(|s| s.lookup(&path));

            let outcome = match request.target.resolve_inherited(&chain) {
                None => Err(ArchiveError::UnresolvedEntry(path.clone())),
                Some(revision) => match own {
                    Some(own) if own.kind() != revision.value.kind() => {
                        Err(ArchiveError::TypeMismatch {
                            path: path.clone(),
                            expected: own.kind(),
                            found: revision.value.kind(),
                        })
                    }
                    _ => Ok(revision),
                },
            };

            match outcome {
                Ok(revision) => {
                    debug!("'{}' resolves to revision {}", path, revision.id);
                    plan.resolved.push((path, revision.value.clone()));
                }
                Err(reason) => {
                    if self.policy == RollbackPolicy::Strict {
                        return Err(reason);
                    }
                    let Some(entry) = chain.first() else {
                        continue;
                    };
                    let current = entry.current().clone();
                    plan.skipped.push((path, current, reason));
                }
            }
        }
        Ok(plan)
    }

    // ==================== Helpers ====================

    fn index_of(&self, id: &str) -> ArchiveResult<usize> {
        self.locations
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| ArchiveError::LocationNotFound(id.to_string()))
    }

    fn scopes(&self, location: &str, recursive: bool) -> ArchiveResult<Vec<&Location>> {
        if recursive {
            self.ancestors(location)
        } else {
            Ok(vec![self.location(location)?])
        }
    }

    fn allocate_revision(&mut self) -> u64 {
        let id = self.next_revision;
        self.next_revision += 1;
        id
    }
}

/// First path segment, which names the backend; keys sit below it
fn backend_of(path: &str) -> ArchiveResult<&str> {
    match split_path(path)?.as_slice() {
        [backend, _, ..] => Ok(*backend),
        _ => Err(ArchiveError::InvalidPath(path.to_string())),
    }
}

fn ensure_backend(location: &mut Location, backend: &str) {
    if !location.contains_backend(backend) {
        info!(
            "Registered backend '{}' to location '{}'",
            backend, location.id
        );
        location.backends.push(backend.to_string());
    }
}

/// Every entry path in `scopes`, nearest scope first, each path once
///
/// Within a scope paths come in pre-order, entries before subdirectories.
fn scope_paths(scopes: &[&Location], backend: Option<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for scope in scopes {
        let tree = scope.tree();
        let start = match backend {
            Some(backend) => tree.lookup_dir(&format!("/{}", backend)),
            None => Some(tree.root()),
        };
        let Some(start) = start else {
            continue;
        };
        for (path, _) in tree.entries_under(start) {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }
    paths
}

fn effective<'a>(scopes: &[&'a Location], path: &str) -> Option<&'a ConfigEntry> {
    scopes.iter().find_map(|scope| scope.lookup(path))
}

//! Configuration Archiver Core Library
//!
//! This crate provides a versioned, hierarchical configuration store. Values
//! are kept per *location* (a named profile that may inherit from a parent
//! location), with full revision history so any key can be rolled back by
//! date, step count or revision id.
//!
//! # Architecture
//!
//! - **XML**: the archive lives in a single XML database file, written
//!   atomically and guarded by an advisory lock
//! - **Locations**: an archive owns a flat list of locations linked to their
//!   parents by id
//! - **Directory trees**: each location stores keys in an arena-backed tree
//!   of directories
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut archive = Archive::load(&config, false)?;
//!
//! archive.store_value("default", "/bg/color1", "#39374b".into(), Utc::now(), StoreMask::Previous)?;
//! let request = RollbackRequest::new(RollbackTarget::Last);
//! archive.rollback("default", &request, Utc::now())?;
//!
//! archive.close()?;
//! ```
//!
//! # Modules
//!
//! - `archive`: the archive and its lifecycle (main entry point)
//! - `location`: named configuration profiles
//! - `tree`: directory tree and entry store
//! - `revision`: rollback resolution
//! - `models`: values, revisions and entries
//! - `document`: XML database and snapshot formats
//! - `store`: the `ConfigStore` capability trait
//! - `storage`: atomic persistence and locking
//! - `config`: application configuration

pub mod archive;
pub mod config;
pub mod document;
pub mod error;
pub mod location;
pub mod models;
pub mod revision;
pub mod storage;
pub mod store;
pub mod tree;
pub mod xml;

pub use archive::{Archive, RollbackReport, RollbackRequest, StoreReport};
pub use config::{Config, RollbackPolicy};
pub use error::{ArchiveError, ArchiveResult, ErrorKind};
pub use location::{Location, LocationSummary, DEFAULT_LOCATION};
pub use models::{ConfigEntry, Revision, StoreMask, Value, ValueKind};
pub use revision::RollbackTarget;
pub use storage::StorageError;
pub use store::ConfigStore;
pub use tree::DirTree;
pub use xml::{Element, XmlError};

//! Data models for the archive
//!
//! Defines configuration values, the revisions that record them over time,
//! and the entries that own a revision history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Ordered named fields
    Struct(Vec<(String, Value)>),
}

/// The variant of a [`Value`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Struct,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Struct(_) => ValueKind::Struct,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl ValueKind {
    /// Name used for the `type` attribute in XML
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Struct => "struct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bool" => Some(ValueKind::Bool),
            "int" => Some(ValueKind::Int),
            "float" => Some(ValueKind::Float),
            "string" => Some(ValueKind::String),
            "bytes" => Some(ValueKind::Bytes),
            "struct" => Some(ValueKind::Struct),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a store treats the revision it follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMask {
    /// The previous revision is marked superseded and becomes trimmable
    #[default]
    Previous,
    /// The previous revision is left as a checkpoint
    None,
}

impl StoreMask {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMask::Previous => "previous",
            StoreMask::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "previous" => Some(StoreMask::Previous),
            "none" => Some(StoreMask::None),
            _ => None,
        }
    }
}

/// An immutable historical value of one entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Revision {
    /// Id of the store operation that wrote this revision
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub value: Value,
    /// Mask the revision was stored with
    pub mask: StoreMask,
    /// Set when a later store retired this revision
    pub superseded: bool,
}

/// A leaf configuration key and its revision history
///
/// Revisions are kept oldest first. An entry always has at least one
/// revision; the last one is the current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub name: String,
    revisions: Vec<Revision>,
}

impl ConfigEntry {
    /// Create an entry from its first revision
    pub fn new(name: impl Into<String>, first: Revision) -> Self {
        Self {
            name: name.into(),
            revisions: vec![first],
        }
    }

    /// Rebuild an entry from stored history; `None` if the history is empty
    pub fn from_history(name: impl Into<String>, revisions: Vec<Revision>) -> Option<Self> {
        if revisions.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            revisions,
        })
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn head(&self) -> &Revision {
        // Non-empty by construction
        &self.revisions[self.revisions.len() - 1]
    }

    pub fn current(&self) -> &Value {
        &self.head().value
    }

    pub fn kind(&self) -> ValueKind {
        self.revisions[0].value.kind()
    }

    /// Append a revision, retiring the previous head when the mask asks for it
    ///
    /// Ordering and type checks are the caller's job; see
    /// [`crate::tree::DirTree::store`].
    pub(crate) fn append(&mut self, revision: Revision) {
        if revision.mask == StoreMask::Previous {
            if let Some(prev) = self.revisions.last_mut() {
                prev.superseded = true;
            }
        }
        self.revisions.push(revision);
    }

    /// Drop the oldest superseded revisions so that at most `keep` of them remain
    ///
    /// The head and checkpoint revisions are never dropped. Returns the
    /// number of revisions removed.
    pub(crate) fn trim(&mut self, keep: usize) -> usize {
        let head = self.revisions.len() - 1;
        let trimmable = self.revisions[..head]
            .iter()
            .filter(|r| r.superseded)
            .count();
        let mut excess = trimmable.saturating_sub(keep);
        let removed = excess;

        let mut index = 0;
        self.revisions.retain(|r| {
            let drop = excess > 0 && index < head && r.superseded;
            if drop {
                excess -= 1;
            }
            index += 1;
            !drop
        });
        removed
    }
}

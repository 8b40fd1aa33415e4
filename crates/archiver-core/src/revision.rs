//! Revision resolution
//!
//! Answers "which revision of this entry does a rollback target?" for each
//! kind of rollback criterion. Resolution never mutates; applying the result
//! is a normal store (see [`crate::Archive::rollback`]).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ArchiveError, ArchiveResult};
use crate::models::{ConfigEntry, Revision};

/// What a rollback should go back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum RollbackTarget {
    /// Latest revision at or before the date
    Date(DateTime<Utc>),
    /// The revision immediately before the current one
    Last,
    /// Walk back this many revisions from the current one
    Steps(usize),
    /// The revision written by this store operation
    RevisionId(u64),
}

impl RollbackTarget {
    /// Build a target from the optional CLI criteria
    ///
    /// Precedence when several are given: revision id, date, steps, last.
    pub fn from_criteria(
        date: Option<DateTime<Utc>>,
        last: bool,
        steps: Option<usize>,
        revision_id: Option<u64>,
    ) -> ArchiveResult<Self> {
        if let Some(id) = revision_id {
            Ok(RollbackTarget::RevisionId(id))
        } else if let Some(date) = date {
            Ok(RollbackTarget::Date(date))
        } else if let Some(steps) = steps {
            Ok(RollbackTarget::Steps(steps))
        } else if last {
            Ok(RollbackTarget::Last)
        } else {
            Err(ArchiveError::NoRollbackCriteria)
        }
    }

    /// Resolve against one entry's history
    pub fn resolve<'a>(&self, entry: &'a ConfigEntry) -> Option<&'a Revision> {
        match *self {
            RollbackTarget::Date(date) => resolve_by_date(entry, date),
            RollbackTarget::Last => resolve_last(entry),
            RollbackTarget::Steps(n) => resolve_by_steps(entry, n),
            RollbackTarget::RevisionId(id) => resolve_by_id(entry, id),
        }
    }

    /// Resolve against an entry and the entries it overrides
    ///
    /// `chain` runs from the nearest scope outwards. Dates and revision ids
    /// match in the nearest entry that has one. `Last` and `Steps` walk back
    /// through the visible value's history: once the nearest entry runs out,
    /// the walk continues with the value it overrides.
    pub fn resolve_inherited<'a>(&self, chain: &[&'a ConfigEntry]) -> Option<&'a Revision> {
        let mut history = chain.iter().flat_map(|entry| entry.revisions().iter().rev());
        match *self {
            RollbackTarget::Last => history.nth(1),
            RollbackTarget::Steps(n) => history.take(n.saturating_add(1)).last(),
            _ => chain.iter().find_map(|entry| self.resolve(entry)),
        }
    }
}

/// Latest revision with a timestamp at or before `date`
pub fn resolve_by_date(entry: &ConfigEntry, date: DateTime<Utc>) -> Option<&Revision> {
    entry
        .revisions()
        .iter()
        .rev()
        .find(|r| r.timestamp <= date)
}

/// Most recent revision strictly older than the current one
pub fn resolve_last(entry: &ConfigEntry) -> Option<&Revision> {
    let revisions = entry.revisions();
    revisions.len().checked_sub(2).map(|i| &revisions[i])
}

/// Revision `n` steps back from the head, clamped to the oldest
///
/// `n == 0` is the head itself. Asking for more steps than there is history
/// returns the first revision rather than failing.
pub fn resolve_by_steps(entry: &ConfigEntry, n: usize) -> Option<&Revision> {
    let revisions = entry.revisions();
    let head = revisions.len().checked_sub(1)?;
    revisions.get(head.saturating_sub(n))
}

/// Revision written by store operation `id`, exact match only
pub fn resolve_by_id(entry: &ConfigEntry, id: u64) -> Option<&Revision> {
    entry.revisions().iter().find(|r| r.id == id)
}

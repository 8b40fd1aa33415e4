//! Directory tree and entry store
//!
//! Maps slash-delimited key paths (`/backend/dir/key`) onto a tree of
//! directories holding [`ConfigEntry`] leaves. Directories live in an arena;
//! a parent owns its children by index and each child keeps a plain index
//! back to its parent, used only to rebuild paths.

use chrono::{DateTime, Utc};

use crate::error::{ArchiveError, ArchiveResult};
use crate::models::{ConfigEntry, Revision, StoreMask, Value};

/// Index of a directory in a [`DirTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(usize);

#[derive(Debug, Clone)]
struct DirNode {
    name: String,
    parent: Option<DirId>,
    entries: Vec<ConfigEntry>,
    children: Vec<DirId>,
}

impl DirNode {
    fn new(name: impl Into<String>, parent: Option<DirId>) -> Self {
        Self {
            name: name.into(),
            parent,
            entries: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Hierarchical key namespace of one location
#[derive(Debug, Clone)]
pub struct DirTree {
    nodes: Vec<DirNode>,
}

const ROOT: DirId = DirId(0);

impl Default for DirTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![DirNode::new("", None)],
        }
    }

    pub fn root(&self) -> DirId {
        ROOT
    }

    pub fn name(&self, dir: DirId) -> &str {
        &self.nodes[dir.0].name
    }

    pub fn parent(&self, dir: DirId) -> Option<DirId> {
        self.nodes[dir.0].parent
    }

    pub fn entries(&self, dir: DirId) -> &[ConfigEntry] {
        &self.nodes[dir.0].entries
    }

    pub fn subdirs(&self, dir: DirId) -> &[DirId] {
        &self.nodes[dir.0].children
    }

    /// Child directory by name
    pub fn subdir(&self, dir: DirId, name: &str) -> Option<DirId> {
        self.nodes[dir.0]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child.0].name == name)
    }

    /// Absolute path of a directory, `/` for the root
    pub fn path_of(&self, dir: DirId) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(dir);
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if node.parent.is_some() {
                segments.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[ROOT.0];
        root.entries.is_empty() && root.children.is_empty()
    }

    /// Resolve a directory path; `None` when any segment is missing
    pub fn lookup_dir(&self, path: &str) -> Option<DirId> {
        let segments = split_path(path).ok()?;
        self.walk_segments(&segments)
    }

    /// Find the entry stored at `path`
    ///
    /// Absence of any segment is reported as `None`, not as an error.
    pub fn lookup(&self, path: &str) -> Option<&ConfigEntry> {
        let segments = split_path(path).ok()?;
        let (name, dirs) = segments.split_last()?;
        let dir = self.walk_segments(dirs)?;
        self.nodes[dir.0].entries.iter().find(|e| e.name == *name)
    }

    /// Append a revision to the entry at `path`, creating directories and the
    /// entry on first write
    ///
    /// Fails without touching the tree if the value type differs from the
    /// entry's recorded type or the timestamp precedes the entry's head.
    pub fn store(
        &mut self,
        path: &str,
        value: Value,
        timestamp: DateTime<Utc>,
        revision_id: u64,
        mask: StoreMask,
    ) -> ArchiveResult<()> {
        self.check_store(path, &value, timestamp)?;
        let segments = split_path(path)?;
        let Some((name, dirs)) = segments.split_last() else {
            return Err(ArchiveError::InvalidPath(path.to_string()));
        };

        let mut dir = ROOT;
        for segment in dirs {
            dir = self.ensure_dir(dir, segment);
        }

        let revision = Revision {
            id: revision_id,
            timestamp,
            value,
            mask,
            superseded: false,
        };

        let entries = &mut self.nodes[dir.0].entries;
        match entries.iter_mut().find(|e| e.name == *name) {
            Some(entry) => entry.append(revision),
            None => entries.push(ConfigEntry::new(*name, revision)),
        }
        Ok(())
    }

    /// Check that [`DirTree::store`] would accept this write
    pub fn check_store(
        &self,
        path: &str,
        value: &Value,
        timestamp: DateTime<Utc>,
    ) -> ArchiveResult<()> {
        split_path(path)?;
        let Some(existing) = self.lookup(path) else {
            return Ok(());
        };
        if existing.kind() != value.kind() {
            return Err(ArchiveError::TypeMismatch {
                path: path.to_string(),
                expected: existing.kind(),
                found: value.kind(),
            });
        }
        let head = existing.head().timestamp;
        if timestamp < head {
            return Err(ArchiveError::NonMonotonicTimestamp {
                path: path.to_string(),
                timestamp,
                head,
            });
        }
        Ok(())
    }

    /// Remove an entry and its entire history
    pub fn purge(&mut self, path: &str) -> Option<ConfigEntry> {
        let segments = split_path(path).ok()?;
        let (name, dirs) = segments.split_last()?;
        let dir = self.walk_segments(dirs)?;
        let entries = &mut self.nodes[dir.0].entries;
        let index = entries.iter().position(|e| e.name == *name)?;
        Some(entries.remove(index))
    }

    /// Remove every directory with no entries and no non-empty subdirectories
    ///
    /// The root is never removed. Returns the number of directories dropped;
    /// a second call with no store in between returns 0.
    pub fn prune_empty(&mut self) -> usize {
        let mut keep = vec![false; self.nodes.len()];
        self.mark_non_empty(ROOT, &mut keep);
        keep[ROOT.0] = true;

        let dropped = self.reachable(ROOT).filter(|id| !keep[id.0]).count();
        if dropped == 0 {
            return 0;
        }

        let mut old: Vec<Option<DirNode>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.nodes = Vec::with_capacity(old.len() - dropped);
        self.rebuild(&mut old, &keep, ROOT, None);
        dropped
    }

    /// Drop superseded history beyond `keep` revisions per entry
    pub fn trim_history(&mut self, keep: usize) -> usize {
        self.nodes
            .iter_mut()
            .flat_map(|node| node.entries.iter_mut())
            .map(|entry| entry.trim(keep))
            .sum()
    }

    /// All entries under `dir` with their absolute paths
    ///
    /// Pre-order: a directory's entries come before its subdirectories, both
    /// in insertion order.
    pub fn entries_under(&self, dir: DirId) -> Vec<(String, &ConfigEntry)> {
        let mut out = Vec::new();
        self.collect(dir, &mut out);
        out
    }

    pub fn entry_count(&self) -> usize {
        self.nodes.iter().map(|n| n.entries.len()).sum()
    }

    pub(crate) fn ensure_dir(&mut self, parent: DirId, name: &str) -> DirId {
        if let Some(existing) = self.subdir(parent, name) {
            return existing;
        }
        let id = DirId(self.nodes.len());
        self.nodes.push(DirNode::new(name, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach a loaded entry; `false` if the name is already taken
    pub(crate) fn insert_entry(&mut self, dir: DirId, entry: ConfigEntry) -> bool {
        let entries = &mut self.nodes[dir.0].entries;
        if entries.iter().any(|e| e.name == entry.name) {
            return false;
        }
        entries.push(entry);
        true
    }

    fn walk_segments(&self, segments: &[&str]) -> Option<DirId> {
        segments
            .iter()
            .try_fold(ROOT, |dir, segment| self.subdir(dir, segment))
    }

    fn collect<'a>(&'a self, dir: DirId, out: &mut Vec<(String, &'a ConfigEntry)>) {
        let node = &self.nodes[dir.0];
        let prefix = self.path_of(dir);
        for entry in &node.entries {
            out.push((join_path(&prefix, &entry.name), entry));
        }
        for &child in &node.children {
            self.collect(child, out);
        }
    }

    fn mark_non_empty(&self, dir: DirId, keep: &mut [bool]) -> bool {
        let node = &self.nodes[dir.0];
        let mut non_empty = !node.entries.is_empty();
        for &child in &node.children {
            non_empty |= self.mark_non_empty(child, keep);
        }
        keep[dir.0] = non_empty;
        non_empty
    }

    fn reachable(&self, dir: DirId) -> impl Iterator<Item = DirId> {
        let mut stack = vec![dir];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().copied());
        }
        order.into_iter()
    }

    fn rebuild(
        &mut self,
        old: &mut [Option<DirNode>],
        keep: &[bool],
        id: DirId,
        parent: Option<DirId>,
    ) -> Option<DirId> {
        let node = old[id.0].take()?;
        let new_id = DirId(self.nodes.len());
        self.nodes.push(DirNode {
            name: node.name,
            parent,
            entries: node.entries,
            children: Vec::new(),
        });
        for child in node.children {
            if keep[child.0] {
                if let Some(new_child) = self.rebuild(old, keep, child, Some(new_id)) {
                    self.nodes[new_id.0].children.push(new_child);
                }
            }
        }
        Some(new_id)
    }
}

impl PartialEq for DirTree {
    /// Structural equality; arena layout is ignored
    fn eq(&self, other: &Self) -> bool {
        fn same(a: &DirTree, a_id: DirId, b: &DirTree, b_id: DirId) -> bool {
            let (x, y) = (&a.nodes[a_id.0], &b.nodes[b_id.0]);
            x.name == y.name
                && x.entries == y.entries
                && x.children.len() == y.children.len()
                && x.children
                    .iter()
                    .zip(&y.children)
                    .all(|(&ca, &cb)| same(a, ca, b, cb))
        }
        same(self, ROOT, other, ROOT)
    }
}

/// Split a key path into segments
///
/// A leading `/` is optional. Empty paths and empty segments are rejected.
pub fn split_path(path: &str) -> ArchiveResult<Vec<&str>> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(ArchiveError::InvalidPath(path.to_string()));
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ArchiveError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Join a directory path and a name with exactly one `/`
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    format!("{}/{}", dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn store(tree: &mut DirTree, path: &str, value: impl Into<Value>, secs: i64, id: u64) {
        tree.store(path, value.into(), at(secs), id, StoreMask::Previous)
            .unwrap();
    }

    #[test]
    fn test_store_creates_intermediate_dirs() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/nested/deep/key", "v", 0, 1);

        let deep = tree.lookup_dir("/bg/nested/deep").unwrap();
        assert_eq!(tree.path_of(deep), "/bg/nested/deep");
        assert_eq!(tree.name(deep), "deep");
        assert_eq!(tree.lookup("/bg/nested/deep/key").unwrap().current(), &Value::from("v"));
    }

    #[test]
    fn test_lookup_missing_segment_is_none() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/color1", "#39374b", 0, 1);

        assert!(tree.lookup("/bg/color2").is_none());
        assert!(tree.lookup("/other/color1").is_none());
        assert!(tree.lookup("/bg").is_none());
        assert!(tree.lookup("").is_none());
    }

    #[test]
    fn test_store_appends_revisions() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/color1", "#39374b", 0, 1);
        store(&mut tree, "/bg/color1", "#112233", 5, 2);

        let entry = tree.lookup("/bg/color1").unwrap();
        assert_eq!(entry.revisions().len(), 2);
        assert_eq!(entry.current(), &Value::from("#112233"));
        assert!(entry.revisions()[0].superseded);
    }

    #[test]
    fn test_store_rejects_type_change() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/size", 10i64, 0, 1);

        let err = tree
            .store("/bg/size", Value::from("ten"), at(1), 2, StoreMask::Previous)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::TypeMismatch { .. }));
        assert_eq!(tree.lookup("/bg/size").unwrap().revisions().len(), 1);
    }

    #[test]
    fn test_store_rejects_earlier_timestamp() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/color1", "a", 10, 1);

        let err = tree
            .store("/bg/color1", Value::from("b"), at(5), 2, StoreMask::Previous)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn test_store_equal_timestamp_allowed() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/color1", "a", 10, 1);
        store(&mut tree, "/bg/color1", "b", 10, 2);
        assert_eq!(tree.lookup("/bg/color1").unwrap().revisions().len(), 2);
    }

    #[test]
    fn test_invalid_paths() {
        let mut tree = DirTree::new();
        for path in ["", "/", "//a", "/a//b", "/a/"] {
            let err = tree
                .store(path, Value::from(1i64), at(0), 1, StoreMask::Previous)
                .unwrap_err();
            assert!(matches!(err, ArchiveError::InvalidPath(_)), "{path}");
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn test_entries_under_is_preorder() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/sub/x", 1i64, 0, 1);
        store(&mut tree, "/bg/a", 2i64, 0, 1);
        store(&mut tree, "/bg/b", 3i64, 0, 1);
        store(&mut tree, "/bg/sub/deeper/y", 4i64, 0, 1);
        store(&mut tree, "/other/z", 5i64, 0, 1);

        let bg = tree.lookup_dir("/bg").unwrap();
        let paths: Vec<String> = tree.entries_under(bg).into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec!["/bg/a", "/bg/b", "/bg/sub/x", "/bg/sub/deeper/y"]
        );

        let all = tree.entries_under(tree.root());
        assert_eq!(all.len(), 5);
        assert_eq!(tree.entry_count(), 5);
    }

    #[test]
    fn test_purge_then_prune() {
        let mut tree = DirTree::new();
        store(&mut tree, "/bg/sub/x", 1i64, 0, 1);
        store(&mut tree, "/bg/keep", 1i64, 0, 1);

        assert!(tree.purge("/bg/sub/x").is_some());
        assert!(tree.purge("/bg/sub/x").is_none());
        assert!(tree.lookup_dir("/bg/sub").is_some());

        assert_eq!(tree.prune_empty(), 1);
        assert!(tree.lookup_dir("/bg/sub").is_none());
        assert!(tree.lookup("/bg/keep").is_some());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut tree = DirTree::new();
        store(&mut tree, "/a/b/c/x", 1i64, 0, 1);
        store(&mut tree, "/a/y", 1i64, 0, 1);
        store(&mut tree, "/d/e/z", 1i64, 0, 1);
        tree.purge("/a/b/c/x");
        tree.purge("/d/e/z");

        assert_eq!(tree.prune_empty(), 4);
        let once = tree.clone();
        assert_eq!(tree.prune_empty(), 0);
        assert_eq!(tree, once);

        // Back-references survive the rebuild
        let a = tree.lookup_dir("/a").unwrap();
        assert_eq!(tree.parent(a), Some(tree.root()));
        assert_eq!(tree.path_of(a), "/a");
    }

    #[test]
    fn test_prune_never_removes_history() {
        let mut tree = DirTree::new();
        store(&mut tree, "/a/b/x", 1i64, 0, 1);
        assert_eq!(tree.prune_empty(), 0);
        assert!(tree.lookup("/a/b/x").is_some());
    }

    #[test]
    fn test_structural_equality_ignores_layout() {
        let mut first = DirTree::new();
        store(&mut first, "/a/x", 1i64, 0, 1);
        store(&mut first, "/b/y", 2i64, 0, 1);

        let mut second = DirTree::new();
        let a = second.ensure_dir(second.root(), "a");
        let b = second.ensure_dir(second.root(), "b");
        store(&mut second, "/b/y", 2i64, 0, 1);
        store(&mut second, "/a/x", 1i64, 0, 1);

        assert_eq!(second.subdirs(second.root()), &[a, b]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "x"), "/x");
        assert_eq!(join_path("/bg", "x"), "/bg/x");
        assert_eq!(join_path("/bg/", "/x"), "/bg/x");
    }
}

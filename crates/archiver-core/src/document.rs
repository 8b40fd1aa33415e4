//! XML document mapping
//!
//! Converts between the in-memory archive and its two XML shapes:
//!
//! - the **database** document (`<archive>`), holding every location with
//!   full revision history
//! - the **snapshot** document (`<config>`), one value per key, used as
//!   store input and rollback preview output
//!
//! Values share one encoding in both: a `type` attribute plus text, or
//! `<field>` children for structs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ArchiveError, ArchiveResult};
use crate::location::{Location, DEFAULT_LOCATION};
use crate::models::{ConfigEntry, Revision, StoreMask, Value, ValueKind};
use crate::tree::{split_path, DirId, DirTree};
use crate::xml::Element;

/// Current database format version
pub const FORMAT_VERSION: u32 = 1;

/// Element and attribute names
mod names {
    pub const ARCHIVE: &str = "archive";
    pub const CONFIG: &str = "config";
    pub const LOCATION: &str = "location";
    pub const BACKEND: &str = "backend";
    pub const DIR: &str = "dir";
    pub const ENTRY: &str = "entry";
    pub const REVISION: &str = "revision";
    pub const VALUE: &str = "value";
    pub const FIELD: &str = "field";

    pub const VERSION: &str = "version";
    pub const CURRENT: &str = "current";
    pub const NEXT_REVISION: &str = "next-revision";
    pub const ID: &str = "id";
    pub const PARENT: &str = "parent";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const TIMESTAMP: &str = "timestamp";
    pub const MASK: &str = "mask";
    pub const SUPERSEDED: &str = "superseded";
}

/// Archive contents as read from a database document
#[derive(Debug)]
pub(crate) struct DecodedArchive {
    pub locations: Vec<Location>,
    /// `None` when the document names no current location
    pub current: Option<String>,
    pub master_backends: Vec<String>,
    pub next_revision: u64,
}

// ==================== Values ====================

/// Write `value` onto `element` as a `type` attribute plus content
pub fn write_value(element: &mut Element, value: &Value) {
    element.set_attr(names::TYPE, value.kind().as_str());
    match value {
        Value::Bool(b) => element.text = b.to_string(),
        Value::Int(n) => element.text = n.to_string(),
        Value::Float(f) => element.text = f.to_string(),
        Value::String(s) => element.text = s.clone(),
        Value::Bytes(bytes) => element.text = STANDARD.encode(bytes),
        Value::Struct(fields) => {
            for (name, field) in fields {
                let mut child = Element::new(names::FIELD).with_attr(names::NAME, name.as_str());
                write_value(&mut child, field);
                element.push(child);
            }
        }
    }
}

/// Read a value written by [`write_value`]
pub fn read_value(element: &Element) -> Result<Value, String> {
    let type_name = element
        .attr(names::TYPE)
        .ok_or_else(|| format!("<{}> has no type", element.name))?;
    let kind = ValueKind::parse(type_name)
        .ok_or_else(|| format!("unknown value type '{}'", type_name))?;
    let text = element.text.as_str();

    let value = match kind {
        ValueKind::Bool => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => return Err(format!("invalid bool '{}'", other)),
        },
        ValueKind::Int => Value::Int(
            text.trim()
                .parse()
                .map_err(|_| format!("invalid int '{}'", text))?,
        ),
        ValueKind::Float => Value::Float(
            text.trim()
                .parse()
                .map_err(|_| format!("invalid float '{}'", text))?,
        ),
        ValueKind::String => Value::String(text.to_string()),
        ValueKind::Bytes => Value::Bytes(
            STANDARD
                .decode(text.trim())
                .map_err(|e| format!("invalid base64: {}", e))?,
        ),
        ValueKind::Struct => {
            let mut fields = Vec::new();
            for child in element.children_named(names::FIELD) {
                let name = child
                    .attr(names::NAME)
                    .ok_or_else(|| "struct field without name".to_string())?;
                fields.push((name.to_string(), read_value(child)?));
            }
            Value::Struct(fields)
        }
    };
    Ok(value)
}

// ==================== Database document ====================

/// Build the database document
pub(crate) fn encode_archive(
    locations: &[Location],
    current: &str,
    master_backends: &[String],
    next_revision: u64,
) -> Element {
    let mut root = Element::new(names::ARCHIVE)
        .with_attr(names::VERSION, FORMAT_VERSION.to_string())
        .with_attr(names::CURRENT, current)
        .with_attr(names::NEXT_REVISION, next_revision.to_string());

    for backend in master_backends {
        root.push(Element::new(names::BACKEND).with_attr(names::ID, backend.as_str()));
    }

    for location in locations {
        let mut el = Element::new(names::LOCATION).with_attr(names::ID, location.id());
        if let Some(parent) = location.parent_id() {
            el.set_attr(names::PARENT, parent);
        }
        for backend in location.backends() {
            el.push(Element::new(names::BACKEND).with_attr(names::ID, backend.as_str()));
        }
        let tree = location.tree();
        encode_dir_contents(tree, tree.root(), &mut el);
        root.push(el);
    }

    root
}

fn encode_dir_contents(tree: &DirTree, dir: DirId, out: &mut Element) {
    for entry in tree.entries(dir) {
        out.push(encode_entry(entry));
    }
    for &child in tree.subdirs(dir) {
        let mut el = Element::new(names::DIR).with_attr(names::NAME, tree.name(child));
        encode_dir_contents(tree, child, &mut el);
        out.push(el);
    }
}

fn encode_entry(entry: &ConfigEntry) -> Element {
    let mut el = Element::new(names::ENTRY).with_attr(names::NAME, entry.name.as_str());
    for revision in entry.revisions() {
        let mut rev = Element::new(names::REVISION)
            .with_attr(names::ID, revision.id.to_string())
            .with_attr(names::TIMESTAMP, format_timestamp(&revision.timestamp))
            .with_attr(names::MASK, revision.mask.as_str());
        if revision.superseded {
            rev.set_attr(names::SUPERSEDED, "true");
        }
        let mut value = Element::new(names::VALUE);
        write_value(&mut value, &revision.value);
        rev.push(value);
        el.push(rev);
    }
    el
}

/// Read a database document
///
/// Structural problems (missing ids, unknown parents, parent cycles,
/// unordered history, no default location) are reported as
/// [`ArchiveError::Corrupt`].
pub(crate) fn decode_archive(root: &Element) -> ArchiveResult<DecodedArchive> {
    if root.name != names::ARCHIVE {
        return Err(corrupt(format!("root element is <{}>", root.name)));
    }
    if let Some(version) = root.attr(names::VERSION) {
        let version: u32 = version
            .parse()
            .map_err(|_| corrupt(format!("invalid version '{}'", version)))?;
        if version > FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", version)));
        }
    }

    let master_backends = root
        .children_named(names::BACKEND)
        .map(|el| required(el, names::ID).map(str::to_string))
        .collect::<ArchiveResult<Vec<_>>>()?;

    let mut locations: Vec<Location> = Vec::new();
    let mut max_revision = 0;
    for el in root.children_named(names::LOCATION) {
        let id = required(el, names::ID)?;
        if locations.iter().any(|l| l.id == id) {
            return Err(corrupt(format!("duplicate location '{}'", id)));
        }
        let mut location = Location::new(id, el.attr(names::PARENT).map(str::to_string));
        for backend in el.children_named(names::BACKEND) {
            location.add_backend(required(backend, names::ID)?)?;
        }
        let tree = &mut location.tree;
        let root_dir = tree.root();
        decode_dir_contents(el, tree, root_dir, &mut max_revision)?;
        locations.push(location);
    }

    validate_links(&locations)?;

    let next_revision = match root.attr(names::NEXT_REVISION) {
        Some(n) => n
            .parse::<u64>()
            .map_err(|_| corrupt(format!("invalid next-revision '{}'", n)))?,
        None => 1,
    }
    .max(max_revision + 1);

    Ok(DecodedArchive {
        locations,
        current: root.attr(names::CURRENT).map(str::to_string),
        master_backends,
        next_revision,
    })
}

fn decode_dir_contents(
    el: &Element,
    tree: &mut DirTree,
    dir: DirId,
    max_revision: &mut u64,
) -> ArchiveResult<()> {
    for child in &el.children {
        match child.name.as_str() {
            names::ENTRY => {
                let entry = decode_entry(child, max_revision)?;
                let name = entry.name.clone();
                if !tree.insert_entry(dir, entry) {
                    return Err(corrupt(format!(
                        "duplicate entry '{}' in {}",
                        name,
                        tree.path_of(dir)
                    )));
                }
            }
            names::DIR => {
                let name = required(child, names::NAME)?;
                if name.is_empty() || name.contains('/') || tree.subdir(dir, name).is_some() {
                    return Err(corrupt(format!(
                        "invalid or duplicate directory '{}' in {}",
                        name,
                        tree.path_of(dir)
                    )));
                }
                let sub = tree.ensure_dir(dir, name);
                decode_dir_contents(child, tree, sub, max_revision)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn decode_entry(el: &Element, max_revision: &mut u64) -> ArchiveResult<ConfigEntry> {
    let name = required(el, names::NAME)?;
    if name.is_empty() || name.contains('/') {
        return Err(corrupt(format!("invalid entry name '{}'", name)));
    }

    let mut revisions: Vec<Revision> = Vec::new();
    for rev in el.children_named(names::REVISION) {
        let id_text = required(rev, names::ID)?;
        let id: u64 = id_text
            .parse()
            .map_err(|_| corrupt(format!("invalid revision id '{}'", id_text)))?;
        let timestamp = parse_timestamp(required(rev, names::TIMESTAMP)?)?;
        let mask = match rev.attr(names::MASK) {
            Some(m) => StoreMask::parse(m).ok_or_else(|| corrupt(format!("invalid mask '{}'", m)))?,
            None => StoreMask::default(),
        };
        let superseded = rev.attr(names::SUPERSEDED) == Some("true");
        let value_el = rev
            .children_named(names::VALUE)
            .next()
            .ok_or_else(|| corrupt(format!("revision {} of '{}' has no value", id, name)))?;
        let value = read_value(value_el).map_err(|e| corrupt(format!("entry '{}': {}", name, e)))?;

        if let Some(prev) = revisions.last() {
            if id <= prev.id || timestamp < prev.timestamp {
                return Err(corrupt(format!("history of '{}' is out of order", name)));
            }
            if value.kind() != prev.value.kind() {
                return Err(corrupt(format!("history of '{}' changes type", name)));
            }
        }
        *max_revision = (*max_revision).max(id);
        revisions.push(Revision {
            id,
            timestamp,
            value,
            mask,
            superseded,
        });
    }

    ConfigEntry::from_history(name, revisions)
        .ok_or_else(|| corrupt(format!("entry '{}' has no revisions", name)))
}

fn validate_links(locations: &[Location]) -> ArchiveResult<()> {
    let find = |id: &str| locations.iter().find(|l| l.id == id);

    match find(DEFAULT_LOCATION) {
        None => return Err(corrupt("no default location".to_string())),
        Some(default) if default.parent.is_some() => {
            return Err(corrupt("default location has a parent".to_string()))
        }
        Some(_) => {}
    }

    for location in locations {
        let mut seen = vec![location.id.as_str()];
        let mut cursor = location.parent.as_deref();
        while let Some(parent_id) = cursor {
            let parent = find(parent_id).ok_or_else(|| {
                corrupt(format!(
                    "location '{}' names missing parent '{}'",
                    location.id, parent_id
                ))
            })?;
            if seen.contains(&parent_id) {
                return Err(corrupt(format!(
                    "parent cycle through location '{}'",
                    location.id
                )));
            }
            seen.push(parent_id);
            cursor = parent.parent.as_deref();
        }
    }
    Ok(())
}

// ==================== Snapshot document ====================

/// Build a snapshot document from `(path, value)` pairs
///
/// With a backend, paths must live under `/<backend>` and are written
/// relative to it. Output is sorted by path with each directory's entries
/// ahead of its subdirectories, so equal inputs give identical documents
/// regardless of order.
pub fn encode_snapshot(backend: Option<&str>, items: &[(String, Value)]) -> Element {
    let mut root = Element::new(names::CONFIG);
    if let Some(backend) = backend {
        root.set_attr(names::BACKEND, backend);
    }

    let mut sorted: Vec<(Vec<&str>, &Value)> = items
        .iter()
        .filter_map(|(path, value)| {
            let mut segments = split_path(path).ok()?;
            if let Some(backend) = backend {
                if segments.first() != Some(&backend) || segments.len() < 2 {
                    return None;
                }
                segments.remove(0);
            }
            Some((segments, value))
        })
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    for (segments, value) in sorted {
        let Some((name, dirs)) = segments.split_last() else {
            continue;
        };
        let mut cursor = &mut root;
        for dir in dirs {
            cursor = child_dir(cursor, dir);
        }
        let mut entry = Element::new(names::ENTRY).with_attr(names::NAME, *name);
        write_value(&mut entry, value);
        let at = cursor
            .children
            .iter()
            .position(|c| c.name == names::DIR)
            .unwrap_or(cursor.children.len());
        cursor.children.insert(at, entry);
    }

    root
}

fn child_dir<'a>(parent: &'a mut Element, name: &str) -> &'a mut Element {
    let index = match parent
        .children
        .iter()
        .position(|c| c.name == names::DIR && c.attr(names::NAME) == Some(name))
    {
        Some(index) => index,
        None => {
            parent.push(Element::new(names::DIR).with_attr(names::NAME, name));
            parent.children.len() - 1
        }
    };
    &mut parent.children[index]
}

/// Read a snapshot document into `(path, value)` pairs under `/<backend>`
///
/// Document order is kept.
pub fn decode_snapshot(root: &Element, backend: &str) -> ArchiveResult<Vec<(String, Value)>> {
    if root.name != names::CONFIG {
        return Err(ArchiveError::Xml(crate::xml::XmlError::Malformed {
            position: 0,
            details: format!("expected <{}> document, found <{}>", names::CONFIG, root.name),
        }));
    }

    let mut items = Vec::new();
    decode_snapshot_dir(root, &format!("/{}", backend), &mut items)?;
    Ok(items)
}

fn decode_snapshot_dir(
    el: &Element,
    prefix: &str,
    items: &mut Vec<(String, Value)>,
) -> ArchiveResult<()> {
    for child in &el.children {
        match child.name.as_str() {
            names::ENTRY => {
                let name = snapshot_name(child)?;
                let path = format!("{}/{}", prefix, name);
                let value = read_value(child).map_err(|e| {
                    ArchiveError::Xml(crate::xml::XmlError::Malformed {
                        position: 0,
                        details: format!("entry '{}': {}", path, e),
                    })
                })?;
                items.push((path, value));
            }
            names::DIR => {
                let name = snapshot_name(child)?;
                decode_snapshot_dir(child, &format!("{}/{}", prefix, name), items)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn snapshot_name(el: &Element) -> ArchiveResult<&str> {
    match el.attr(names::NAME) {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name),
        other => Err(ArchiveError::InvalidPath(other.unwrap_or_default().to_string())),
    }
}

// ==================== Helpers ====================

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(text: &str) -> ArchiveResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("invalid timestamp '{}': {}", text, e)))
}

fn required<'a>(el: &'a Element, attr: &str) -> ArchiveResult<&'a str> {
    el.attr(attr)
        .ok_or_else(|| corrupt(format!("<{}> is missing '{}'", el.name, attr)))
}

fn corrupt(details: String) -> ArchiveError {
    ArchiveError::Corrupt(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn value_round_trip(value: Value) {
        let mut el = Element::new("value");
        write_value(&mut el, &value);
        let text = el.to_document().unwrap();
        let parsed = Element::parse(&text).unwrap();
        assert_eq!(read_value(&parsed).unwrap(), value);
    }

    #[test]
    fn test_value_encoding_is_lossless() {
        value_round_trip(Value::Bool(true));
        value_round_trip(Value::Int(-42));
        value_round_trip(Value::Float(0.1 + 0.2));
        value_round_trip(Value::String(String::new()));
        value_round_trip(Value::String(" spaced <&> ".into()));
        value_round_trip(Value::Bytes(vec![0, 159, 255]));
        value_round_trip(Value::Struct(vec![
            ("x".into(), Value::Int(1)),
            ("inner".into(), Value::Struct(vec![("s".into(), "v".into())])),
            ("empty".into(), Value::Struct(vec![])),
        ]));
    }

    #[test]
    fn test_read_value_errors() {
        let el = Element::new("value").with_attr("type", "int");
        assert!(read_value(&el).is_err());

        let el = Element::new("value").with_attr("type", "pair");
        assert!(read_value(&el).unwrap_err().contains("unknown value type"));

        assert!(read_value(&Element::new("value")).is_err());
    }

    fn sample_locations() -> Vec<Location> {
        let mut default = Location::new(DEFAULT_LOCATION, None);
        default.add_backend("bg").unwrap();
        default
            .tree
            .store("/bg/color1", "#39374b".into(), t(0), 1, StoreMask::Previous)
            .unwrap();
        default
            .tree
            .store("/bg/color1", "#112233".into(), t(5), 2, StoreMask::None)
            .unwrap();
        default
            .tree
            .store("/bg/sub/depth", Value::Int(3), t(5), 2, StoreMask::Previous)
            .unwrap();

        let mut work = Location::new("work", Some(DEFAULT_LOCATION.into()));
        work.tree
            .store("/bg/color1", "#000000".into(), t(9), 3, StoreMask::Previous)
            .unwrap();
        vec![default, work]
    }

    #[test]
    fn test_archive_round_trip() {
        let locations = sample_locations();
        let masters = vec!["global-bg".to_string()];
        let el = encode_archive(&locations, "work", &masters, 4);

        let text = el.to_document().unwrap();
        let decoded = decode_archive(&Element::parse(&text).unwrap()).unwrap();

        assert_eq!(decoded.locations, locations);
        assert_eq!(decoded.current.as_deref(), Some("work"));
        assert_eq!(decoded.master_backends, masters);
        assert_eq!(decoded.next_revision, 4);
    }

    #[test]
    fn test_next_revision_repaired_from_history() {
        let el = encode_archive(&sample_locations(), "default", &[], 1);
        let decoded = decode_archive(&el).unwrap();
        assert_eq!(decoded.next_revision, 4);
    }

    #[test]
    fn test_decode_rejects_missing_default() {
        let root = Element::parse(r#"<archive><location id="work"/></archive>"#).unwrap();
        assert!(matches!(
            decode_archive(&root),
            Err(ArchiveError::Corrupt(_))
        ));
    }

    #[test]
    fn test_decode_rejects_parent_cycle() {
        let root = Element::parse(
            r#"<archive>
                 <location id="default"/>
                 <location id="a" parent="b"/>
                 <location id="b" parent="a"/>
               </archive>"#,
        )
        .unwrap();
        let err = decode_archive(&root).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_decode_rejects_unordered_history() {
        let root = Element::parse(
            r#"<archive>
                 <location id="default">
                   <entry name="k">
                     <revision id="2" timestamp="2024-01-01T00:00:10Z"><value type="int">1</value></revision>
                     <revision id="3" timestamp="2024-01-01T00:00:05Z"><value type="int">2</value></revision>
                   </entry>
                 </location>
               </archive>"#,
        )
        .unwrap();
        let err = decode_archive(&root).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn test_decode_rejects_wrong_root() {
        let root = Element::new("gconf");
        assert!(decode_archive(&root).is_err());
    }

    #[test]
    fn test_snapshot_is_canonical() {
        let a = vec![
            ("/bg/sub/depth".to_string(), Value::Int(3)),
            ("/bg/color1".to_string(), Value::from("#39374b")),
            ("/bg/a".to_string(), Value::Bool(true)),
            ("/other/x".to_string(), Value::Int(1)),
        ];
        let mut b = a.clone();
        b.reverse();

        let first = encode_snapshot(Some("bg"), &a);
        assert_eq!(first, encode_snapshot(Some("bg"), &b));

        // Entries ahead of directories, other backends filtered out
        let names: Vec<&str> = first.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "entry", "dir"]);
        assert_eq!(first.children[0].attr("name"), Some("a"));
        assert_eq!(first.attr("backend"), Some("bg"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let items = vec![
            ("/bg/color1".to_string(), Value::from("#39374b")),
            ("/bg/sub/depth".to_string(), Value::Int(3)),
        ];
        let text = encode_snapshot(Some("bg"), &items).to_document().unwrap();
        let decoded = decode_snapshot(&Element::parse(&text).unwrap(), "bg").unwrap();
        assert_eq!(decoded, items);
    }

    #[test]
    fn test_all_backends_snapshot() {
        let items = vec![
            ("/bg/color1".to_string(), Value::from("#39374b")),
            ("/kbd/rate".to_string(), Value::Int(30)),
        ];
        let root = encode_snapshot(None, &items);
        assert!(root.attr("backend").is_none());
        let dirs: Vec<_> = root
            .children_named("dir")
            .filter_map(|d| d.attr("name"))
            .collect();
        assert_eq!(dirs, vec!["bg", "kbd"]);
    }

    #[test]
    fn test_decode_snapshot_rejects_bad_names() {
        let root = Element::parse(r#"<config><entry name="a/b" type="int">1</entry></config>"#)
            .unwrap();
        assert!(matches!(
            decode_snapshot(&root, "bg"),
            Err(ArchiveError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_timestamp_format_round_trip() {
        let ts = t(1) + chrono::Duration::nanoseconds(1500);
        let text = format_timestamp(&ts);
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
        assert_eq!(format_timestamp(&t(0)), "2024-01-01T00:00:00Z");
    }
}

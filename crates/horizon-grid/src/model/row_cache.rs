//! Row identity cache.
//!
//! Every row gets a stable [`RowId`], read from the configured key path or
//! generated and written back when the key is blank. The cache keeps one
//! [`RowIndexEntry`] per known row with its positions in each coordinate
//! space:
//!
//! | field        | coordinate space                                  |
//! |--------------|---------------------------------------------------|
//! | `index`      | full dataset (roots only in tree mode)            |
//! | `flat_index` | after-data (filtered, sorted, expanded)           |
//! | `view_index` | rendered window                                   |
//!
//! Two maps are maintained. The source map describes the dataset as it was
//! last loaded and survives reverts; the "all" map also tracks inserted rows.
//! A row whose key changes between rebuilds is simply a different row.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use horizon_grid_core::PerfSpan;
use horizon_grid_core::logging::{span_names, targets};

use crate::model::tree::TreeStore;
use crate::record::{Record, get_path, is_blank, set_path};

/// Stable per-row identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier derived from a key value. Blank values have no identity.
    pub fn from_value(value: &Value) -> Option<Self> {
        if is_blank(Some(value)) {
            return None;
        }
        Some(match value {
            Value::String(s) => Self(s.clone()),
            other => Self(other.to_string()),
        })
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for RowId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// User-facing sequence number; a path of 1-based positions for tree rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seq(Vec<usize>);

impl Seq {
    /// Sequence of the row at zero-based `index` of a flat list.
    pub fn flat(index: usize) -> Self {
        Self(vec![index + 1])
    }

    /// Sequence from zero-based sibling positions, root first.
    pub fn from_path(path: &[usize]) -> Self {
        Self(path.iter().map(|i| i + 1).collect())
    }

    /// The 1-based positions.
    pub fn parts(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Cached metadata for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIndexEntry {
    pub rowid: RowId,
    pub seq: Option<Seq>,
    /// Position in the full dataset; tree children have none.
    pub index: Option<usize>,
    /// Position in the after-data.
    pub flat_index: Option<usize>,
    /// Position in the rendered window.
    pub view_index: Option<usize>,
    /// Tree depth, 0 for roots and flat rows.
    pub level: usize,
    pub parent: Option<RowId>,
    /// Position among the parent's children (or among the roots).
    pub sibling_index: usize,
    pub tree_loaded: bool,
    pub expand_loaded: bool,
}

impl RowIndexEntry {
    pub fn new(rowid: RowId) -> Self {
        Self {
            rowid,
            seq: None,
            index: None,
            flat_index: None,
            view_index: None,
            level: 0,
            parent: None,
            sibling_index: 0,
            tree_loaded: false,
            expand_loaded: false,
        }
    }
}

/// The full dataset as handed to [`RowCache::rebuild`].
#[derive(Debug, Clone, Copy)]
pub enum DatasetShape<'a> {
    Flat(&'a [RowId]),
    Tree(&'a TreeStore),
}

/// Owns row identity and per-row index metadata for one grid.
#[derive(Debug)]
pub struct RowCache {
    key_field: String,
    next_surrogate: u64,
    source: HashMap<RowId, RowIndexEntry>,
    all: HashMap<RowId, RowIndexEntry>,
    /// Explicit keys of a batch being loaded, kept out of surrogate ids.
    reserved: HashSet<RowId>,
    /// Rows that currently carry a `view_index`.
    windowed: Vec<RowId>,
}

impl RowCache {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            next_surrogate: 0,
            source: HashMap::new(),
            all: HashMap::new(),
            reserved: HashSet::new(),
            windowed: Vec::new(),
        }
    }

    /// Dotted path the row key is read from.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Existing identity of `record`, without assigning one.
    pub fn row_id(&self, record: &Record) -> Option<RowId> {
        get_path(record, &self.key_field).and_then(RowId::from_value)
    }

    /// Identity of `record`, generating and storing a surrogate if the key is
    /// blank. Idempotent.
    pub fn assign_id(&mut self, record: &mut Record) -> RowId {
        if let Some(id) = self.row_id(record) {
            return id;
        }
        let id = self.generate_id();
        set_path(record, &self.key_field, Value::String(id.0.clone()));
        id
    }

    /// Reserve the explicit keys of `records` (and of nested records under
    /// `children_field`) so surrogates assigned in the same batch never
    /// collide with them.
    pub fn reserve_keys(&mut self, records: &[Record], children_field: Option<&str>) {
        for record in records {
            self.reserve_record(record, children_field);
        }
    }

    fn reserve_record(&mut self, record: &Record, children_field: Option<&str>) {
        if let Some(id) = self.row_id(record) {
            self.reserved.insert(id);
        }
        let Some(field) = children_field else {
            return;
        };
        if let Some(Value::Array(children)) = get_path(record, field) {
            for child in children.iter().filter_map(Value::as_object) {
                self.reserve_record(child, children_field);
            }
        }
    }

    fn generate_id(&mut self) -> RowId {
        loop {
            self.next_surrogate += 1;
            let id = RowId(format!("row_{}", self.next_surrogate));
            if !self.all.contains_key(&id) && !self.reserved.contains(&id) {
                return id;
            }
        }
    }

    /// Walk the full dataset and repopulate the caches.
    ///
    /// With `is_source` both maps are rebuilt; otherwise only the map of all
    /// known rows is. Loaded flags of surviving rows are kept.
    pub fn rebuild(&mut self, shape: DatasetShape<'_>, is_source: bool) {
        let _perf = PerfSpan::new(span_names::ROW_CACHE);
        let previous = std::mem::take(&mut self.all);
        let carry = |entry: &mut RowIndexEntry| {
            if let Some(old) = previous.get(&entry.rowid) {
                entry.tree_loaded = old.tree_loaded;
                entry.expand_loaded = old.expand_loaded;
            }
        };

        match shape {
            DatasetShape::Flat(rows) => {
                for (i, rowid) in rows.iter().enumerate() {
                    let mut entry = RowIndexEntry::new(rowid.clone());
                    entry.seq = Some(Seq::flat(i));
                    entry.index = Some(i);
                    entry.sibling_index = i;
                    carry(&mut entry);
                    self.all.insert(rowid.clone(), entry);
                }
            }
            DatasetShape::Tree(tree) => {
                tree.walk(|rowid, path, parent| {
                    let mut entry = RowIndexEntry::new(rowid.clone());
                    entry.seq = Some(Seq::from_path(path));
                    entry.level = path.len() - 1;
                    entry.parent = parent.cloned();
                    entry.sibling_index = path[path.len() - 1];
                    if parent.is_none() {
                        entry.index = Some(entry.sibling_index);
                    }
                    carry(&mut entry);
                    self.all.insert(rowid.clone(), entry);
                });
            }
        }

        if is_source {
            self.source = self.all.clone();
        }
        self.reserved.clear();
        self.windowed.clear();
        tracing::debug!(
            target: targets::ROWS,
            rows = self.all.len(),
            is_source,
            "row cache rebuilt"
        );
    }

    /// Add a single row, e.g. an inserted record or a lazily loaded child.
    pub fn insert(&mut self, entry: RowIndexEntry, also_source: bool) {
        if also_source {
            self.source.insert(entry.rowid.clone(), entry.clone());
        }
        self.all.insert(entry.rowid.clone(), entry);
    }

    /// Forget a row permanently.
    pub fn remove(&mut self, rowid: &RowId) -> Option<RowIndexEntry> {
        self.source.remove(rowid);
        self.windowed.retain(|id| id != rowid);
        self.all.remove(rowid)
    }

    pub fn lookup(&self, rowid: &RowId) -> Option<&RowIndexEntry> {
        self.all.get(rowid)
    }

    pub fn lookup_mut(&mut self, rowid: &RowId) -> Option<&mut RowIndexEntry> {
        self.all.get_mut(rowid)
    }

    /// Entry as of the last source load.
    pub fn lookup_source(&self, rowid: &RowId) -> Option<&RowIndexEntry> {
        self.source.get(rowid)
    }

    pub fn contains(&self, rowid: &RowId) -> bool {
        self.all.contains_key(rowid)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Refresh `flat_index` and `seq` after the pipeline produced new
    /// after-data.
    ///
    /// `after` is the ordered after-data. For tree data, `after_tree` is the
    /// filtered/sorted topology the sequence paths are computed from; `after`
    /// is then its expanded flattening.
    pub fn refresh_after(&mut self, after: &[RowId], after_tree: Option<&TreeStore>) {
        for entry in self.all.values_mut() {
            entry.flat_index = None;
        }
        match after_tree {
            None => {
                for (i, rowid) in after.iter().enumerate() {
                    if let Some(entry) = self.all.get_mut(rowid) {
                        entry.flat_index = Some(i);
                        entry.seq = Some(Seq::flat(i));
                    }
                }
            }
            Some(tree) => {
                tree.walk(|rowid, path, _| {
                    if let Some(entry) = self.all.get_mut(rowid) {
                        entry.seq = Some(Seq::from_path(path));
                    }
                });
                for (i, rowid) in after.iter().enumerate() {
                    if let Some(entry) = self.all.get_mut(rowid) {
                        entry.flat_index = Some(i);
                    }
                }
            }
        }
    }

    /// Refresh `view_index` for the rows of the rendered window.
    pub fn refresh_view(&mut self, window: &[RowId]) {
        for rowid in self.windowed.drain(..) {
            if let Some(entry) = self.all.get_mut(&rowid) {
                entry.view_index = None;
            }
        }
        for (i, rowid) in window.iter().enumerate() {
            if let Some(entry) = self.all.get_mut(rowid) {
                entry.view_index = Some(i);
                self.windowed.push(rowid.clone());
            }
        }
    }

    /// Ids of every known row.
    pub fn row_ids(&self) -> HashSet<RowId> {
        self.all.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::record_from_value;
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<RowId> {
        values.iter().map(|v| RowId::from(*v)).collect()
    }

    #[test]
    fn test_assign_id_reads_key() {
        let mut cache = RowCache::new("id");
        let mut record = record_from_value(json!({"id": 7})).unwrap();
        assert_eq!(cache.assign_id(&mut record), RowId::from("7"));
        assert_eq!(cache.assign_id(&mut record), RowId::from("7"));
    }

    #[test]
    fn test_assign_id_generates_and_writes_back() {
        let mut cache = RowCache::new("meta.key");
        let mut record = record_from_value(json!({"name": "a"})).unwrap();
        let id = cache.assign_id(&mut record);
        assert_eq!(get_path(&record, "meta.key"), Some(&json!(id.as_str())));
        assert_eq!(cache.assign_id(&mut record), id);

        let mut other = record_from_value(json!({"meta": {"key": ""}})).unwrap();
        assert_ne!(cache.assign_id(&mut other), id);
    }

    #[test]
    fn test_surrogate_skips_reserved_keys() {
        let mut cache = RowCache::new("id");
        let records = vec![
            record_from_value(json!({"name": "no key"})).unwrap(),
            record_from_value(json!({"id": "row_1", "children": [{"id": "row_2"}]})).unwrap(),
        ];
        cache.reserve_keys(&records, Some("children"));

        let mut first = records[0].clone();
        assert_eq!(cache.assign_id(&mut first), RowId::from("row_3"));
    }

    #[test]
    fn test_rebuild_flat() {
        let mut cache = RowCache::new("id");
        cache.rebuild(DatasetShape::Flat(&ids(&["a", "b", "c"])), true);

        let b = cache.lookup(&RowId::from("b")).unwrap();
        assert_eq!(b.index, Some(1));
        assert_eq!(b.seq.as_ref().unwrap().to_string(), "2");
        assert_eq!(b.level, 0);
        assert!(cache.lookup_source(&RowId::from("b")).is_some());
    }

    #[test]
    fn test_non_source_rebuild_keeps_source_map() {
        let mut cache = RowCache::new("id");
        cache.rebuild(DatasetShape::Flat(&ids(&["a", "b"])), true);
        cache.rebuild(DatasetShape::Flat(&ids(&["b", "x"])), false);

        assert!(cache.lookup(&RowId::from("a")).is_none());
        assert!(cache.lookup_source(&RowId::from("a")).is_some());
        assert!(cache.lookup_source(&RowId::from("x")).is_none());
        assert_eq!(cache.lookup(&RowId::from("b")).unwrap().index, Some(0));
    }

    #[test]
    fn test_rebuild_keeps_loaded_flags() {
        let mut cache = RowCache::new("id");
        let rows = ids(&["a"]);
        cache.rebuild(DatasetShape::Flat(&rows), true);
        cache.lookup_mut(&rows[0]).unwrap().expand_loaded = true;
        cache.rebuild(DatasetShape::Flat(&rows), false);
        assert!(cache.lookup(&rows[0]).unwrap().expand_loaded);
    }

    #[test]
    fn test_refresh_after_and_view() {
        let mut cache = RowCache::new("id");
        cache.rebuild(DatasetShape::Flat(&ids(&["a", "b", "c"])), true);

        cache.refresh_after(&ids(&["c", "a"]), None);
        assert_eq!(cache.lookup(&RowId::from("c")).unwrap().flat_index, Some(0));
        assert_eq!(cache.lookup(&RowId::from("a")).unwrap().flat_index, Some(1));
        assert_eq!(cache.lookup(&RowId::from("b")).unwrap().flat_index, None);
        assert_eq!(cache.lookup(&RowId::from("a")).unwrap().seq, Some(Seq::flat(1)));

        cache.refresh_view(&ids(&["a"]));
        assert_eq!(cache.lookup(&RowId::from("a")).unwrap().view_index, Some(0));
        cache.refresh_view(&ids(&["c"]));
        assert_eq!(cache.lookup(&RowId::from("a")).unwrap().view_index, None);
        assert_eq!(cache.lookup(&RowId::from("c")).unwrap().view_index, Some(0));
    }

    #[test]
    fn test_seq_display() {
        assert_eq!(Seq::from_path(&[0, 1, 2]).to_string(), "1.2.3");
        assert_eq!(Seq::flat(0).parts(), &[1]);
    }
}

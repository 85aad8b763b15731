//! Filter/sort pipeline.
//!
//! Produces the after-data from the full dataset:
//!
//! 1. **Filter**: every column with checked filter options must accept the
//!    row (AND). Within a column the row passes if any checked option
//!    matches (OR).
//! 2. **Sort**: a stable multi-key sort over the sorted columns. Keys come
//!    from the column's `sort_by`, else from the cell value, and are compared
//!    numerically or as text according to the column's [`SortType`].
//!
//! For tree data the filter keeps a node when it matches or any descendant
//! does (a matching node keeps its whole subtree), and the sort orders each
//! sibling group on its own.
//!
//! Remote filtering or sorting skips the corresponding local step; the host
//! is expected to deliver already filtered or sorted data.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use horizon_grid_core::PerfSpan;
use horizon_grid_core::logging::{span_names, targets};

use crate::model::column::{Column, ColumnId, ColumnRegistry, SortBy};
use crate::model::row_cache::RowId;
use crate::model::tree::TreeStore;
use crate::record::{CellAccessor, CellValue, Record, cell_label, get_path};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// How sort keys are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortType {
    /// Numeric when the value looks like a number, text otherwise.
    #[default]
    Auto,
    Number,
    String,
}

/// A requested sort on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: ColumnId,
    pub order: SortOrder,
}

/// One selectable filter value of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: CellValue,
    pub label: String,
    #[serde(default)]
    pub checked: bool,
    /// Free-form payload for custom filter methods.
    #[serde(default)]
    pub data: CellValue,
}

impl FilterOption {
    pub fn new(value: impl Into<CellValue>) -> Self {
        let value = value.into();
        Self {
            label: cell_label(&value),
            value,
            checked: false,
            data: CellValue::Null,
        }
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }
}

/// Arguments handed to filter predicates.
pub struct FilterParams<'a> {
    pub option: &'a FilterOption,
    pub cell_value: &'a CellValue,
    pub row: &'a Record,
    pub column: &'a Column,
}

/// Arguments handed to the grid-wide filter method: every checked option
/// of one column at once.
pub struct ColumnFilterParams<'a> {
    pub options: &'a [&'a FilterOption],
    pub cell_value: &'a CellValue,
    pub row: &'a Record,
    pub column: &'a Column,
}

impl ColumnFilterParams<'_> {
    /// Values of the checked options.
    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.options.iter().map(|option| &option.value)
    }
}

/// Grid-wide filter predicate, used for columns without their own method.
pub type GlobalFilterFn = Arc<dyn Fn(&ColumnFilterParams<'_>) -> bool + Send + Sync>;

/// One active sort handed to a sort method.
#[derive(Clone, Copy)]
pub struct SortColumn<'a> {
    pub column: &'a Column,
    pub order: SortOrder,
}

/// Arguments handed to the grid-wide sort method.
pub struct SortParams<'a> {
    /// Rows to order: the after-data, or one sibling group of a tree.
    pub rows: &'a [RowId],
    pub records: &'a HashMap<RowId, Record>,
    /// Active sorts in the order they apply.
    pub sort_list: &'a [SortColumn<'a>],
}

/// Grid-wide sort method. Replaces the built-in multi-key sort; the result
/// must be a reordering of `rows`.
pub type SortMethodFn = Arc<dyn Fn(&SortParams<'_>) -> Vec<RowId> + Send + Sync>;

/// Comparable form of a sort key.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Null,
    Number(f64),
    Text(String),
}

impl SortKey {
    /// Derive the comparable key of `value` under `sort_type`.
    pub fn from_value(value: &CellValue, sort_type: SortType) -> Self {
        if value.is_null() {
            return Self::Null;
        }
        let label = cell_label(value);
        match sort_type {
            SortType::String => Self::Text(label),
            SortType::Number => Self::Number(
                value
                    .as_f64()
                    .or_else(|| label.trim().parse::<f64>().ok())
                    .filter(|n| n.is_finite())
                    .unwrap_or(0.0),
            ),
            SortType::Auto => match value
                .as_f64()
                .or_else(|| label.trim().parse::<f64>().ok())
                .filter(|n| n.is_finite())
            {
                Some(n) => Self::Number(n),
                None => Self::Text(label),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    /// Nulls first, then numbers, then text.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// One run of the pipeline over borrowed grid state.
pub struct Pipeline<'a> {
    pub columns: &'a ColumnRegistry,
    pub records: &'a HashMap<RowId, Record>,
    pub accessor: &'a dyn CellAccessor,
    pub filter_method: Option<&'a GlobalFilterFn>,
    pub sort_method: Option<&'a SortMethodFn>,
    pub remote_filter: bool,
    pub remote_sort: bool,
    /// Apply sorted columns in the order they were toggled.
    pub chronological: bool,
}

type ActiveFilter<'a> = (&'a Column, Vec<&'a FilterOption>);

impl<'a> Pipeline<'a> {
    /// Filter and sort a flat dataset.
    pub fn run_flat(&self, full: &[RowId]) -> Vec<RowId> {
        let _perf = PerfSpan::new(span_names::PIPELINE);
        let filters = self.active_filters();
        let mut after: Vec<RowId> = if filters.is_empty() {
            full.to_vec()
        } else {
            full.iter()
                .filter(|rowid| self.row_matches(rowid, &filters))
                .cloned()
                .collect()
        };

        let sorts = self.active_sorts();
        if !sorts.is_empty() {
            match self.sort_method {
                Some(method) => {
                    let list = sort_list(&sorts);
                    after = self.apply_sort_method(method, &after, &list);
                }
                None => {
                    let keys = self.sort_keys(after.iter(), &sorts);
                    after.sort_by(|a, b| compare_keys(&keys, a, b, &sorts));
                }
            }
        }

        tracing::debug!(
            target: targets::PIPELINE,
            full = full.len(),
            after = after.len(),
            filters = filters.len(),
            sorts = sorts.len(),
            "flat pipeline run"
        );
        after
    }

    /// Filter and sort a tree, returning the after topology.
    pub fn run_tree(&self, tree: &TreeStore) -> TreeStore {
        let _perf = PerfSpan::new(span_names::PIPELINE);
        let filters = self.active_filters();
        let mut after = if filters.is_empty() {
            tree.clone()
        } else {
            let mut keep = HashSet::new();
            for root in tree.roots() {
                self.mark_kept(tree, root, false, &filters, &mut keep);
            }
            tree.retain_copy(|rowid| keep.contains(rowid))
        };

        let sorts = self.active_sorts();
        if !sorts.is_empty() {
            match self.sort_method {
                Some(method) => {
                    let list = sort_list(&sorts);
                    after.reorder_siblings(|group| self.apply_sort_method(method, group, &list));
                }
                None => {
                    let ids = after.flatten_all();
                    let keys = self.sort_keys(ids.iter(), &sorts);
                    after.sort_siblings(|a, b| compare_keys(&keys, a, b, &sorts));
                }
            }
        }

        tracing::debug!(
            target: targets::PIPELINE,
            full = tree.len(),
            after = after.len(),
            "tree pipeline run"
        );
        after
    }

    fn mark_kept(
        &self,
        tree: &TreeStore,
        rowid: &RowId,
        ancestor_matched: bool,
        filters: &[ActiveFilter<'_>],
        keep: &mut HashSet<RowId>,
    ) -> bool {
        let matched = ancestor_matched || self.row_matches(rowid, filters);
        let mut descendant_kept = false;
        for child in tree.children(rowid) {
            descendant_kept |= self.mark_kept(tree, child, matched, filters, keep);
        }
        let kept = matched || descendant_kept;
        if kept {
            keep.insert(rowid.clone());
        }
        kept
    }

    fn active_filters(&self) -> Vec<ActiveFilter<'a>> {
        if self.remote_filter {
            return Vec::new();
        }
        self.columns
            .leaves()
            .filter_map(|(_, column)| {
                let checked: Vec<&FilterOption> =
                    column.filters.iter().filter(|o| o.checked).collect();
                (!checked.is_empty()).then_some((column, checked))
            })
            .collect()
    }

    fn active_sorts(&self) -> Vec<(&'a Column, SortOrder)> {
        if self.remote_sort {
            return Vec::new();
        }
        let mut sorted = self.columns.sorted();
        if self.chronological {
            sorted.sort_by_key(|(_, _, time)| *time);
        }
        sorted
            .into_iter()
            .filter_map(|(id, order, _)| self.columns.get(id).map(|c| (c, order)))
            .collect()
    }

    /// Whether a row passes every active column filter.
    fn row_matches(&self, rowid: &RowId, filters: &[ActiveFilter<'_>]) -> bool {
        let Some(row) = self.records.get(rowid) else {
            return false;
        };
        filters.iter().all(|(column, options)| {
            let cell_value = self.accessor.get_cell_value(row, column);
            if let (None, Some(method)) = (&column.filter_method, self.filter_method) {
                return method(&ColumnFilterParams {
                    options,
                    cell_value: &cell_value,
                    row,
                    column,
                });
            }
            options.iter().any(|&option| {
                let params = FilterParams {
                    option,
                    cell_value: &cell_value,
                    row,
                    column,
                };
                match &column.filter_method {
                    Some(method) => method(&params),
                    None => default_filter(&params),
                }
            })
        })
    }

    /// Order `rows` with the grid-wide sort method. A result that is not a
    /// reordering of `rows` is discarded.
    fn apply_sort_method(&self, method: &SortMethodFn, rows: &[RowId], sort_list: &[SortColumn<'_>]) -> Vec<RowId> {
        let sorted = method(&SortParams {
            rows,
            records: self.records,
            sort_list,
        });
        if is_reordering(rows, &sorted) {
            sorted
        } else {
            tracing::warn!(
                target: targets::PIPELINE,
                rows = rows.len(),
                returned = sorted.len(),
                "sort method result is not a reordering of its rows; ignored"
            );
            rows.to_vec()
        }
    }

    fn sort_keys<'r, I>(
        &self,
        rows: I,
        sorts: &[(&Column, SortOrder)],
    ) -> HashMap<RowId, Vec<SortKey>>
    where
        I: Iterator<Item = &'r RowId>,
    {
        rows.filter_map(|rowid| {
            let row = self.records.get(rowid)?;
            let keys = sorts
                .iter()
                .map(|(column, _)| {
                    let value = match &column.sort_by {
                        Some(SortBy::Field(field)) => {
                            get_path(row, field).cloned().unwrap_or(CellValue::Null)
                        }
                        Some(SortBy::Key(key)) => key(row, column),
                        None => self.accessor.get_cell_value(row, column),
                    };
                    SortKey::from_value(&value, column.sort_type)
                })
                .collect();
            Some((rowid.clone(), keys))
        })
        .collect()
    }
}

fn sort_list<'c>(sorts: &[(&'c Column, SortOrder)]) -> Vec<SortColumn<'c>> {
    sorts
        .iter()
        .map(|&(column, order)| SortColumn { column, order })
        .collect()
}

fn is_reordering(rows: &[RowId], sorted: &[RowId]) -> bool {
    if rows.len() != sorted.len() {
        return false;
    }
    let expected: HashSet<&RowId> = rows.iter().collect();
    let seen: HashSet<&RowId> = sorted.iter().collect();
    seen.len() == sorted.len() && sorted.iter().all(|id| expected.contains(id))
}

/// Checked option value equals the cell value, or both format the same.
fn default_filter(params: &FilterParams<'_>) -> bool {
    params.option.value == *params.cell_value
        || cell_label(&params.option.value) == cell_label(params.cell_value)
}

fn compare_keys(
    keys: &HashMap<RowId, Vec<SortKey>>,
    a: &RowId,
    b: &RowId,
    sorts: &[(&Column, SortOrder)],
) -> Ordering {
    let (Some(ka), Some(kb)) = (keys.get(a), keys.get(b)) else {
        return Ordering::Equal;
    };
    for (i, (_, order)) in sorts.iter().enumerate() {
        let ordering = ka[i].cmp(&kb[i]);
        let ordering = match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnresolvedParent;
    use crate::model::tree::TreeLink;
    use crate::record::{PathAccessor, record_from_value};
    use serde_json::json;

    struct Fixture {
        columns: ColumnRegistry,
        records: HashMap<RowId, Record>,
        order: Vec<RowId>,
    }

    impl Fixture {
        fn new(columns: Vec<Column>, rows: Vec<serde_json::Value>) -> Self {
            let mut registry = ColumnRegistry::new();
            registry.load(columns);
            let mut records = HashMap::new();
            let mut order = Vec::new();
            for row in rows {
                let record = record_from_value(row).unwrap();
                let id = RowId::from_value(&record["id"]).unwrap();
                order.push(id.clone());
                records.insert(id, record);
            }
            Self {
                columns: registry,
                records,
                order,
            }
        }

        fn pipeline(&self) -> Pipeline<'_> {
            Pipeline {
                columns: &self.columns,
                records: &self.records,
                accessor: &PathAccessor,
                filter_method: None,
                sort_method: None,
                remote_filter: false,
                remote_sort: false,
                chronological: false,
            }
        }

        fn sort(&mut self, field: &str, order: SortOrder, time: u64) {
            let id = self.columns.by_field(field).unwrap();
            let column = self.columns.get_mut(id).unwrap();
            column.order = Some(order);
            column.sort_time = time;
        }

        fn check(&mut self, field: &str, values: &[serde_json::Value]) {
            let id = self.columns.by_field(field).unwrap();
            let column = self.columns.get_mut(id).unwrap();
            for option in &mut column.filters {
                option.checked = values.contains(&option.value);
            }
        }
    }

    fn names(rows: &[RowId]) -> Vec<&str> {
        rows.iter().map(RowId::as_str).collect()
    }

    fn people() -> Fixture {
        Fixture::new(
            vec![
                Column::new("id"),
                Column::new("name").sortable(),
                Column::new("age").sortable().with_filters(vec![
                    FilterOption::new(20),
                    FilterOption::new(30),
                    FilterOption::new(40),
                ]),
                Column::new("team").with_filters(vec![FilterOption::new("a"), FilterOption::new("b")]),
            ],
            vec![
                json!({"id": "p1", "name": "Carl", "age": 30, "team": "a"}),
                json!({"id": "p2", "name": "Anna", "age": "20", "team": "b"}),
                json!({"id": "p3", "name": "Bert", "age": 40, "team": "a"}),
                json!({"id": "p4", "name": "Dana", "age": 30, "team": "b"}),
            ],
        )
    }

    #[test]
    fn test_no_filter_no_sort_passthrough() {
        let fixture = people();
        assert_eq!(fixture.pipeline().run_flat(&fixture.order), fixture.order);
    }

    #[test]
    fn test_filter_or_within_and_across_columns() {
        let mut fixture = people();
        fixture.check("age", &[json!(20), json!(30)]);
        assert_eq!(names(&fixture.pipeline().run_flat(&fixture.order)), ["p1", "p2", "p4"]);

        fixture.check("team", &[json!("b")]);
        assert_eq!(names(&fixture.pipeline().run_flat(&fixture.order)), ["p2", "p4"]);
    }

    #[test]
    fn test_numeric_strings_sort_numerically() {
        let mut fixture = people();
        fixture.sort("age", SortOrder::Desc, 1);
        // Ties keep their original order.
        assert_eq!(
            names(&fixture.pipeline().run_flat(&fixture.order)),
            ["p3", "p1", "p4", "p2"]
        );
    }

    #[test]
    fn test_multi_sort_chronological() {
        let mut fixture = people();
        fixture.sort("name", SortOrder::Desc, 2);
        fixture.sort("age", SortOrder::Asc, 1);

        // Definition order: name is the primary key.
        assert_eq!(
            names(&fixture.pipeline().run_flat(&fixture.order)),
            ["p4", "p1", "p3", "p2"]
        );

        // Toggle order: age first, name breaks the tie between p1 and p4.
        let mut pipeline = fixture.pipeline();
        pipeline.chronological = true;
        assert_eq!(names(&pipeline.run_flat(&fixture.order)), ["p2", "p4", "p1", "p3"]);
    }

    #[test]
    fn test_remote_modes_skip_local_work() {
        let mut fixture = people();
        fixture.sort("name", SortOrder::Asc, 1);
        fixture.check("team", &[json!("a")]);
        let mut pipeline = fixture.pipeline();
        pipeline.remote_filter = true;
        pipeline.remote_sort = true;
        assert_eq!(pipeline.run_flat(&fixture.order), fixture.order);

        pipeline.remote_sort = false;
        assert_eq!(names(&pipeline.run_flat(&fixture.order)), ["p2", "p3", "p1", "p4"]);
    }

    #[test]
    fn test_column_filter_method_wins() {
        let mut fixture = Fixture::new(
            vec![Column::new("id"), Column::new("age").with_filters(vec![FilterOption::new(25)]).with_filter_method(
                |params| params.cell_value.as_f64().unwrap_or(0.0) >= params.option.value.as_f64().unwrap_or(0.0),
            )],
            vec![json!({"id": "a", "age": 20}), json!({"id": "b", "age": 31})],
        );
        fixture.check("age", &[json!(25)]);
        assert_eq!(names(&fixture.pipeline().run_flat(&fixture.order)), ["b"]);
    }

    #[test]
    fn test_grid_filter_method_sees_all_checked_options() {
        let mut fixture = people();
        fixture.check("age", &[json!(20), json!(40)]);
        // Keep ages between the smallest and largest checked value.
        let method: GlobalFilterFn = Arc::new(|params: &ColumnFilterParams<'_>| {
            let bounds: Vec<f64> = params.values().filter_map(|v| v.as_f64()).collect();
            let low = bounds.iter().copied().fold(f64::INFINITY, f64::min);
            let high = bounds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let age = params
                .cell_value
                .as_f64()
                .or_else(|| params.cell_value.as_str().and_then(|s| s.parse().ok()))
                .unwrap_or(f64::NAN);
            params.options.len() == 2 && age >= low && age <= high
        });
        let mut pipeline = fixture.pipeline();
        assert_eq!(names(&pipeline.run_flat(&fixture.order)), ["p2", "p3"]);

        pipeline.filter_method = Some(&method);
        assert_eq!(names(&pipeline.run_flat(&fixture.order)), ["p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_sort_method_replaces_builtin_sort() {
        let mut fixture = people();
        fixture.sort("name", SortOrder::Asc, 1);
        let reverse: SortMethodFn = Arc::new(|params: &SortParams<'_>| {
            assert_eq!(params.sort_list.len(), 1);
            assert_eq!(params.sort_list[0].order, SortOrder::Asc);
            params.rows.iter().rev().cloned().collect()
        });
        let broken: SortMethodFn = Arc::new(|_: &SortParams<'_>| Vec::new());

        let mut pipeline = fixture.pipeline();
        pipeline.sort_method = Some(&reverse);
        assert_eq!(names(&pipeline.run_flat(&fixture.order)), ["p4", "p3", "p2", "p1"]);

        // A result that drops rows is ignored.
        pipeline.sort_method = Some(&broken);
        assert_eq!(pipeline.run_flat(&fixture.order), fixture.order);
    }

    #[test]
    fn test_sort_by_field_and_type() {
        let mut fixture = Fixture::new(
            vec![
                Column::new("id"),
                Column::new("code").with_sort_type(SortType::String),
                Column::new("label").with_sort_by(SortBy::Field("rank".into())),
            ],
            vec![
                json!({"id": "a", "code": "10", "rank": 2}),
                json!({"id": "b", "code": "9", "rank": 1}),
            ],
        );
        fixture.sort("code", SortOrder::Asc, 1);
        assert_eq!(names(&fixture.pipeline().run_flat(&fixture.order)), ["a", "b"]);

        let code = fixture.columns.by_field("code").unwrap();
        fixture.columns.get_mut(code).unwrap().order = None;
        fixture.sort("label", SortOrder::Asc, 2);
        assert_eq!(names(&fixture.pipeline().run_flat(&fixture.order)), ["b", "a"]);
    }

    #[test]
    fn test_sort_key_ordering() {
        let mut keys = vec![
            SortKey::from_value(&json!("b"), SortType::Auto),
            SortKey::from_value(&json!(null), SortType::Auto),
            SortKey::from_value(&json!("10"), SortType::Auto),
            SortKey::from_value(&json!(9), SortType::Auto),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SortKey::Null,
                SortKey::Number(9.0),
                SortKey::Number(10.0),
                SortKey::Text("b".into())
            ]
        );
        assert_eq!(SortKey::from_value(&json!("x"), SortType::Number), SortKey::Number(0.0));
    }

    #[test]
    fn test_tree_filter_keeps_ancestors_and_subtrees() {
        let mut fixture = Fixture::new(
            vec![Column::new("id"), Column::new("kind").with_filters(vec![FilterOption::new("leaf")])],
            vec![
                json!({"id": "1", "kind": "dir"}),
                json!({"id": "2", "kind": "dir"}),
                json!({"id": "3", "kind": "leaf"}),
                json!({"id": "4", "kind": "dir"}),
                json!({"id": "5", "kind": "leaf"}),
                json!({"id": "6", "kind": "dir"}),
            ],
        );
        let link = |id: &str, parent: Option<&str>| TreeLink {
            rowid: RowId::from(id),
            key: Some(id.to_string()),
            parent_key: parent.map(str::to_string),
        };
        let tree = TreeStore::from_parent_keys(
            &[
                link("1", None),
                link("2", Some("1")),
                link("3", Some("2")),
                link("4", None),
                link("5", None),
                link("6", Some("5")),
            ],
            UnresolvedParent::Warn,
        );
        fixture.check("kind", &[json!("leaf")]);
        let after = fixture.pipeline().run_tree(&tree);
        assert_eq!(names(&after.flatten_all()), ["1", "2", "3", "5", "6"]);
    }

    #[test]
    fn test_tree_sort_per_sibling_group() {
        let mut fixture = Fixture::new(
            vec![Column::new("id"), Column::new("n").sortable()],
            vec![
                json!({"id": "r1", "n": 2}),
                json!({"id": "c1", "n": 9}),
                json!({"id": "c2", "n": 1}),
                json!({"id": "r2", "n": 1}),
            ],
        );
        let link = |id: &str, parent: Option<&str>| TreeLink {
            rowid: RowId::from(id),
            key: Some(id.to_string()),
            parent_key: parent.map(str::to_string),
        };
        let tree = TreeStore::from_parent_keys(
            &[link("r1", None), link("c1", Some("r1")), link("c2", Some("r1")), link("r2", None)],
            UnresolvedParent::Warn,
        );
        fixture.sort("n", SortOrder::Asc, 1);
        let after = fixture.pipeline().run_tree(&tree);
        assert_eq!(names(&after.flatten_all()), ["r2", "r1", "c2", "c1"]);
    }
}

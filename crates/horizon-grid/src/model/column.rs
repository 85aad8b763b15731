//! Column registry.
//!
//! Columns are stored in a slot map and addressed by [`ColumnId`]. A column
//! with children is a header group; only leaves hold data. The registry
//! derives three orders from the definition:
//!
//! - `collect`: the top-level definitions (groups and ungrouped leaves)
//! - `full`: every leaf, in definition order
//! - `visible`: visible leaves, left-fixed first, then unfixed, then
//!   right-fixed
//!
//! Each column also has a [`ColumnIndexEntry`] with its position in those
//! orders and its place in the header hierarchy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use horizon_grid_core::logging::targets;

use crate::model::pipeline::{FilterOption, FilterParams, SortOrder, SortType};
use crate::record::{CellValue, Record};

new_key_type! {
    /// Stable identifier of a registered column.
    pub struct ColumnId;
}

/// Side a column is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedSide {
    Left,
    Right,
}

/// Role of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    #[default]
    Data,
    /// Row sequence numbers.
    Seq,
    /// Checkbox selection.
    Checkbox,
    /// Row detail toggle.
    Expand,
}

/// Custom sort key extractor.
pub type SortKeyFn = Arc<dyn Fn(&Record, &Column) -> CellValue + Send + Sync>;

/// Column-level filter predicate, called once per checked option.
pub type ColumnFilterFn = Arc<dyn Fn(&FilterParams<'_>) -> bool + Send + Sync>;

/// Where the sort key of a column comes from.
#[derive(Clone)]
pub enum SortBy {
    /// Another dotted field of the row.
    Field(String),
    /// A computed key.
    Key(SortKeyFn),
}

impl fmt::Debug for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Self::Key(_) => f.write_str("Key(..)"),
        }
    }
}

/// A column definition plus its runtime sort/filter state.
#[derive(Clone)]
pub struct Column {
    /// Dotted path of the cell value in each row.
    pub field: Option<String>,
    pub title: String,
    /// Rendered width in pixels.
    pub width: f32,
    pub visible: bool,
    pub fixed: Option<FixedSide>,
    pub kind: ColumnKind,
    /// Renders the tree expand toggle.
    pub tree_node: bool,
    pub editable: bool,
    pub sortable: bool,
    pub sort_by: Option<SortBy>,
    pub sort_type: SortType,
    pub filters: Vec<FilterOption>,
    pub filter_method: Option<ColumnFilterFn>,
    pub children: Vec<Column>,
    pub(crate) order: Option<SortOrder>,
    pub(crate) sort_time: u64,
    default_visible: bool,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("field", &self.field)
            .field("title", &self.title)
            .field("visible", &self.visible)
            .field("fixed", &self.fixed)
            .field("kind", &self.kind)
            .field("order", &self.order)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl Column {
    /// A data column bound to `field`.
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            title: field.clone(),
            field: Some(field),
            ..Self::untitled()
        }
    }

    /// A column bound to no field.
    pub fn untitled() -> Self {
        Self {
            field: None,
            title: String::new(),
            width: 100.0,
            visible: true,
            fixed: None,
            kind: ColumnKind::Data,
            tree_node: false,
            editable: false,
            sortable: false,
            sort_by: None,
            sort_type: SortType::Auto,
            filters: Vec::new(),
            filter_method: None,
            children: Vec::new(),
            order: None,
            sort_time: 0,
            default_visible: true,
        }
    }

    /// A header group.
    pub fn group(title: impl Into<String>, children: Vec<Column>) -> Self {
        Self {
            title: title.into(),
            children,
            ..Self::untitled()
        }
    }

    /// A special-purpose column.
    pub fn of_kind(kind: ColumnKind) -> Self {
        Self {
            kind,
            ..Self::untitled()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn fixed(mut self, side: FixedSide) -> Self {
        self.fixed = Some(side);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self.default_visible = false;
        self
    }

    pub fn tree_node(mut self) -> Self {
        self.tree_node = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with_sort_type(mut self, sort_type: SortType) -> Self {
        self.sortable = true;
        self.sort_type = sort_type;
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sortable = true;
        self.sort_by = Some(sort_by);
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterOption>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_filter_method<F>(mut self, method: F) -> Self
    where
        F: Fn(&FilterParams<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter_method = Some(Arc::new(method));
        self
    }

    /// Current sort order, if this column is sorted.
    pub fn order(&self) -> Option<SortOrder> {
        self.order
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether any filter option is checked.
    pub fn is_filtered(&self) -> bool {
        self.filters.iter().any(|o| o.checked)
    }
}

/// A column reference as accepted by public operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColRef {
    /// Position among the visible columns.
    Index(usize),
    /// Bound field.
    Field(String),
    #[serde(skip)]
    Id(ColumnId),
}

impl From<ColumnId> for ColRef {
    fn from(id: ColumnId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ColRef {
    fn from(field: &str) -> Self {
        Self::Field(field.to_string())
    }
}

impl From<usize> for ColRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for ColRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Field(field) => f.write_str(field),
            Self::Id(id) => write!(f, "{id:?}"),
        }
    }
}

/// Cached metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndexEntry {
    pub colid: ColumnId,
    /// Position among all leaves; groups have none.
    pub index: Option<usize>,
    /// Position among visible leaves.
    pub flat_index: Option<usize>,
    /// Position in the rendered window.
    pub view_index: Option<usize>,
    pub parent: Option<ColumnId>,
    pub children: Vec<ColumnId>,
    /// Header nesting depth, 0 for top-level columns.
    pub level: usize,
}

/// Owns every column of one grid.
#[derive(Debug, Default)]
pub struct ColumnRegistry {
    columns: SlotMap<ColumnId, Column>,
    entries: SecondaryMap<ColumnId, ColumnIndexEntry>,
    collect: Vec<ColumnId>,
    full: Vec<ColumnId>,
    visible: Vec<ColumnId>,
    windowed: Vec<ColumnId>,
    by_field: HashMap<String, ColumnId>,
    is_group: bool,
    tree_node: Option<ColumnId>,
    expand: Option<ColumnId>,
    checkbox: Option<ColumnId>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all columns with `columns`.
    pub fn load(&mut self, columns: Vec<Column>) {
        *self = Self::default();
        let mut collect = Vec::with_capacity(columns.len());
        for column in columns {
            collect.push(self.register(column, None, 0));
        }
        self.collect = collect;
        for (i, id) in self.full.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(*id) {
                entry.index = Some(i);
            }
        }
        self.refresh_visible();
        tracing::debug!(
            target: targets::COLUMNS,
            columns = self.full.len(),
            grouped = self.is_group,
            "columns loaded"
        );
    }

    fn register(&mut self, mut column: Column, parent: Option<ColumnId>, level: usize) -> ColumnId {
        if let Some(parent) = parent.and_then(|p| self.columns.get(p)) {
            if parent.fixed.is_some() {
                column.fixed = parent.fixed;
            }
        }
        let children = std::mem::take(&mut column.children);
        let is_leaf = children.is_empty();
        let kind = column.kind;
        let tree_node = column.tree_node;
        let field = column.field.clone();
        let id = self.columns.insert(column);

        let mut child_ids = Vec::with_capacity(children.len());
        if !is_leaf {
            self.is_group = true;
            for child in children {
                child_ids.push(self.register(child, Some(id), level + 1));
            }
        } else {
            self.full.push(id);
            if let Some(field) = field {
                if self.by_field.insert(field.clone(), id).is_some() {
                    tracing::warn!(target: targets::COLUMNS, field, "duplicate column field");
                }
            }
            match kind {
                ColumnKind::Expand => self.expand = self.expand.or(Some(id)),
                ColumnKind::Checkbox => self.checkbox = self.checkbox.or(Some(id)),
                _ => {}
            }
            if tree_node {
                self.tree_node = self.tree_node.or(Some(id));
            }
        }

        self.entries.insert(
            id,
            ColumnIndexEntry {
                colid: id,
                index: None,
                flat_index: None,
                view_index: None,
                parent,
                children: child_ids,
                level,
            },
        );
        id
    }

    /// Recompute the visible order. Returns `true` if it changed.
    pub fn refresh_visible(&mut self) -> bool {
        let (mut left, mut center, mut right) = (Vec::new(), Vec::new(), Vec::new());
        for &id in &self.full {
            let Some(column) = self.columns.get(id) else {
                continue;
            };
            if !column.visible {
                continue;
            }
            match column.fixed {
                Some(FixedSide::Left) => left.push(id),
                Some(FixedSide::Right) => right.push(id),
                None => center.push(id),
            }
        }
        left.extend(center);
        left.extend(right);
        let changed = left != self.visible;

        for entry in self.entries.values_mut() {
            entry.flat_index = None;
        }
        for (i, id) in left.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(*id) {
                entry.flat_index = Some(i);
            }
        }
        self.visible = left;
        changed
    }

    /// Refresh `view_index` for the columns of the rendered window.
    pub fn refresh_view(&mut self, window: &[ColumnId]) {
        for id in self.windowed.drain(..) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.view_index = None;
            }
        }
        for (i, id) in window.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(*id) {
                entry.view_index = Some(i);
                self.windowed.push(*id);
            }
        }
    }

    pub fn get(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id)
    }

    pub fn get_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.get_mut(id)
    }

    pub fn entry(&self, id: ColumnId) -> Option<&ColumnIndexEntry> {
        self.entries.get(id)
    }

    pub fn by_field(&self, field: &str) -> Option<ColumnId> {
        self.by_field.get(field).copied()
    }

    /// Resolve a reference to a registered leaf column.
    pub fn resolve(&self, column: &ColRef) -> Option<ColumnId> {
        match column {
            ColRef::Index(i) => self.visible.get(*i).copied(),
            ColRef::Field(field) => self.by_field(field),
            ColRef::Id(id) => self
                .entries
                .get(*id)
                .filter(|e| e.children.is_empty())
                .map(|e| e.colid),
        }
    }

    /// Top-level definitions.
    pub fn collect(&self) -> &[ColumnId] {
        &self.collect
    }

    /// All leaf columns in definition order.
    pub fn full(&self) -> &[ColumnId] {
        &self.full
    }

    /// Visible leaf columns, left, center, right.
    pub fn visible(&self) -> &[ColumnId] {
        &self.visible
    }

    /// Iterate over leaf columns.
    pub fn leaves(&self) -> impl Iterator<Item = (ColumnId, &Column)> {
        self.full
            .iter()
            .filter_map(|id| self.columns.get(*id).map(|c| (*id, c)))
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn has_fixed(&self) -> bool {
        self.leaves().any(|(_, c)| c.visible && c.fixed.is_some())
    }

    pub fn column_index(&self, id: ColumnId) -> Option<usize> {
        self.entries.get(id).and_then(|e| e.index)
    }

    pub fn vt_column_index(&self, id: ColumnId) -> Option<usize> {
        self.entries.get(id).and_then(|e| e.flat_index)
    }

    pub fn vm_column_index(&self, id: ColumnId) -> Option<usize> {
        self.entries.get(id).and_then(|e| e.view_index)
    }

    /// Set visibility of a column (or every leaf of a group).
    ///
    /// Returns `true` if the visible order changed.
    pub fn set_visible(&mut self, id: ColumnId, visible: bool) -> bool {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.entries.get(current) {
                stack.extend(entry.children.iter().copied());
            }
            if let Some(column) = self.columns.get_mut(current) {
                column.visible = visible;
            }
        }
        self.refresh_visible()
    }

    /// Restore the visibility every column was defined with.
    pub fn reset_visibility(&mut self) -> bool {
        for column in self.columns.values_mut() {
            column.visible = column.default_visible;
        }
        self.refresh_visible()
    }

    /// Widths of the visible columns, in visible order.
    pub fn visible_widths(&self) -> Vec<f32> {
        self.visible
            .iter()
            .filter_map(|id| self.columns.get(*id).map(|c| c.width))
            .collect()
    }

    pub fn tree_node_column(&self) -> Option<ColumnId> {
        self.tree_node
    }

    pub fn expand_column(&self) -> Option<ColumnId> {
        self.expand
    }

    pub fn checkbox_column(&self) -> Option<ColumnId> {
        self.checkbox
    }

    /// First visible column that accepts edits.
    pub fn first_editable(&self) -> Option<ColumnId> {
        self.visible
            .iter()
            .copied()
            .find(|id| self.columns.get(*id).is_some_and(|c| c.editable))
    }

    /// Sorted columns with their order and sort time.
    pub fn sorted(&self) -> Vec<(ColumnId, SortOrder, u64)> {
        self.leaves()
            .filter_map(|(id, c)| c.order.map(|o| (id, o, c.sort_time)))
            .collect()
    }

    /// Columns with at least one checked filter option.
    pub fn filtered(&self) -> Vec<ColumnId> {
        self.leaves()
            .filter(|(_, c)| c.is_filtered())
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(columns: Vec<Column>) -> ColumnRegistry {
        let mut registry = ColumnRegistry::new();
        registry.load(columns);
        registry
    }

    fn fields(registry: &ColumnRegistry, ids: &[ColumnId]) -> Vec<String> {
        ids.iter()
            .map(|id| registry.get(*id).unwrap().field.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_visible_order_left_center_right() {
        let registry = registry(vec![
            Column::new("a"),
            Column::new("b").fixed(FixedSide::Right),
            Column::new("c").fixed(FixedSide::Left),
            Column::new("d").hidden(),
            Column::new("e"),
        ]);

        assert_eq!(fields(&registry, registry.full()), ["a", "b", "c", "d", "e"]);
        assert_eq!(fields(&registry, registry.visible()), ["c", "a", "e", "b"]);

        let b = registry.by_field("b").unwrap();
        assert_eq!(registry.column_index(b), Some(1));
        assert_eq!(registry.vt_column_index(b), Some(3));
        assert!(registry.has_fixed());
    }

    #[test]
    fn test_grouped_columns() {
        let registry = registry(vec![
            Column::new("id"),
            Column::group("Name", vec![Column::new("first"), Column::new("last")])
                .fixed(FixedSide::Left),
        ]);

        assert!(registry.is_group());
        assert_eq!(registry.collect().len(), 2);
        assert_eq!(fields(&registry, registry.visible()), ["first", "last", "id"]);

        let last = registry.by_field("last").unwrap();
        let entry = registry.entry(last).unwrap();
        assert_eq!(entry.level, 1);
        let group = registry.entry(entry.parent.unwrap()).unwrap();
        assert_eq!(group.children.len(), 2);
        assert_eq!(group.index, None);
        assert_eq!(registry.resolve(&ColRef::Id(group.colid)), None);
    }

    #[test]
    fn test_hide_show_reset() {
        let mut registry = registry(vec![Column::new("a"), Column::new("b"), Column::new("c").hidden()]);
        let a = registry.by_field("a").unwrap();

        assert!(registry.set_visible(a, false));
        assert_eq!(fields(&registry, registry.visible()), ["b"]);
        assert_eq!(registry.vt_column_index(a), None);
        assert!(!registry.set_visible(a, false));

        assert!(registry.reset_visibility());
        assert_eq!(fields(&registry, registry.visible()), ["a", "b"]);
    }

    #[test]
    fn test_resolve_and_special_columns() {
        let registry = registry(vec![
            Column::of_kind(ColumnKind::Checkbox),
            Column::new("name").tree_node().editable(),
            Column::of_kind(ColumnKind::Expand),
        ]);
        let name = registry.by_field("name").unwrap();
        assert_eq!(registry.resolve(&ColRef::Index(1)), Some(name));
        assert_eq!(registry.resolve(&"name".into()), Some(name));
        assert_eq!(registry.resolve(&ColRef::Index(9)), None);
        assert_eq!(registry.tree_node_column(), Some(name));
        assert_eq!(registry.first_editable(), Some(name));
        assert!(registry.checkbox_column().is_some());
        assert!(registry.expand_column().is_some());
    }

    #[test]
    fn test_view_index() {
        let mut registry = registry(vec![Column::new("a"), Column::new("b"), Column::new("c")]);
        let visible = registry.visible().to_vec();
        registry.refresh_view(&visible[1..]);
        assert_eq!(registry.vm_column_index(visible[0]), None);
        assert_eq!(registry.vm_column_index(visible[2]), Some(1));
        assert_eq!(registry.visible_widths(), vec![100.0; 3]);
    }
}

//! The grid facade.
//!
//! [`Grid`] owns every cache of one grid instance and is their only writer.
//! Hosts request operations and read derived state; nothing hands out
//! mutable access to the caches.
//!
//! Operations are grouped by concern:
//!
//! - `data`: loading, insert/remove, recordset and revert
//! - `columns`: column loading and visibility
//! - `sort_filter`: sort and filter state, re-running the pipeline
//! - `tree_ops`: tree expansion and lazy children
//! - `expand_ops`: row detail expansion and checkbox selection
//! - `merge_ops`: merged cell spans
//! - `scroll`: viewport, virtual windows and scrolling
//! - `edit_ops`: selection, activation, commit and focus
//!
//! # Example
//!
//! ```ignore
//! use horizon_grid::prelude::*;
//!
//! let config = GridConfig::default().with_edit(EditMode::Cell);
//! let mut grid = Grid::new(config, vec![Column::new("name").editable()]);
//! grid.load_data(records);
//!
//! let row = grid.after_data()[0].clone();
//! pollster::block_on(grid.set_edit_cell(&row, "name"));
//! grid.set_edit_value(serde_json::json!("renamed"));
//! pollster::block_on(grid.commit_edit());
//! ```

mod columns;
mod data;
mod edit_ops;
mod expand_ops;
mod merge_ops;
mod scroll;
mod sort_filter;
mod tree_ops;

use std::collections::HashMap;

use horizon_grid_core::logging::targets;
use horizon_grid_core::{Signal, TickQueue};

use crate::config::{DEFAULT_ROW_KEY, GridConfig, TreeConfig};
use crate::error::{GridError, Result};
use crate::events::{CellEvent, EventBus, GridEvent};
use crate::hooks::{ExpandKind, GridHooks, ToggleParams};
use crate::model::column::{ColRef, Column, ColumnId, ColumnRegistry};
use crate::model::merge::{Axis, MergeList};
use crate::model::pipeline::Pipeline;
use crate::model::row_cache::{DatasetShape, RowCache, RowId, RowIndexEntry, Seq};
use crate::model::tree::{TreeExpandState, TreeStore};
use crate::record::{CellValue, Record};
use crate::view::checkbox::CheckboxSelection;
use crate::view::edit::{CellPos, EditStore};
use crate::view::row_expand::RowExpandState;
use crate::view::window::{ScrollDebounce, VirtualAxis};

pub use data::{InsertPosition, Recordset};
pub use scroll::{ScrollInfo, Viewport};
pub use tree_ops::ExpandOutcome;

/// Row height assumed until the host reports one.
pub const DEFAULT_ROW_HEIGHT: f32 = 48.0;

/// A data grid engine instance.
pub struct Grid {
    config: GridConfig,
    hooks: GridHooks,

    rows: RowCache,
    records: HashMap<RowId, Record>,
    /// Records as of the last load, for revert and update detection.
    source: HashMap<RowId, Record>,
    /// The input of the last load, for a full revert.
    source_input: Vec<Record>,
    /// Full order of flat data. Unused in tree mode.
    full: Vec<RowId>,
    tree: Option<TreeStore>,
    tree_expand: TreeExpandState,
    after_tree: Option<TreeStore>,
    after: Vec<RowId>,
    inserted: Vec<RowId>,
    removed: Vec<Record>,

    columns: ColumnRegistry,
    merges: MergeList,
    scroll_x: VirtualAxis,
    scroll_y: VirtualAxis,
    y_debounce: ScrollDebounce,

    edit: EditStore,
    checkbox: CheckboxSelection,
    row_expand: RowExpandState,
    events: EventBus,
    focus_queue: TickQueue<CellPos>,
    sort_clock: u64,
}

impl Grid {
    /// Create a grid with `columns` and no data.
    ///
    /// Configuration problems are logged and the grid runs in a degraded
    /// mode rather than failing.
    pub fn new(config: GridConfig, columns: Vec<Column>) -> Self {
        for issue in config.diagnose() {
            tracing::warn!(target: targets::GRID, %issue, "configuration problem");
        }
        let key_field = if config.row.key_field.trim().is_empty() {
            DEFAULT_ROW_KEY.to_string()
        } else {
            config.row.key_field.clone()
        };
        let mut scroll_y = VirtualAxis::new(Axis::Row, config.scroll_y);
        scroll_y.set_uniform_extent(DEFAULT_ROW_HEIGHT);
        let tree = config.tree.as_ref().map(|_| TreeStore::new());

        let mut grid = Self {
            hooks: GridHooks::default(),
            rows: RowCache::new(key_field),
            records: HashMap::new(),
            source: HashMap::new(),
            source_input: Vec::new(),
            full: Vec::new(),
            after_tree: tree.clone(),
            tree,
            tree_expand: TreeExpandState::default(),
            after: Vec::new(),
            inserted: Vec::new(),
            removed: Vec::new(),
            columns: ColumnRegistry::new(),
            merges: MergeList::new(),
            scroll_x: VirtualAxis::new(Axis::Column, config.scroll_x),
            scroll_y,
            y_debounce: ScrollDebounce::default(),
            edit: EditStore::new(config.edit_mode().unwrap_or_default()),
            checkbox: CheckboxSelection::new(),
            row_expand: RowExpandState::default(),
            events: EventBus::new(),
            focus_queue: TickQueue::new(),
            sort_clock: 0,
            config,
        };
        grid.load_column(columns);
        grid
    }

    /// Replace the host callbacks.
    pub fn with_hooks(mut self, hooks: GridHooks) -> Self {
        self.set_hooks(hooks);
        self
    }

    pub fn set_hooks(&mut self, hooks: GridHooks) {
        self.hooks = hooks;
        self.handle_data();
        self.notify();
    }

    pub fn hooks(&self) -> &GridHooks {
        &self.hooks
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The event channel. Every [`GridEvent`] goes through it.
    pub fn events(&self) -> &Signal<GridEvent> {
        self.events.signal()
    }

    pub fn dispatch_event(&self, event: GridEvent) {
        self.events.dispatch(event);
    }

    // =========================================================================
    // Row queries
    // =========================================================================

    pub fn is_tree(&self) -> bool {
        self.tree.is_some()
    }

    /// Full tree topology, in tree mode.
    pub fn tree(&self) -> Option<&TreeStore> {
        self.tree.as_ref()
    }

    pub fn get_row_by_id(&self, rowid: &RowId) -> Option<&Record> {
        self.records.get(rowid)
    }

    /// Identity of a record, as stored in its key field.
    pub fn get_row_id(&self, record: &Record) -> Option<RowId> {
        self.rows.row_id(record)
    }

    pub fn get_row_entry(&self, rowid: &RowId) -> Option<&RowIndexEntry> {
        self.rows.lookup(rowid)
    }

    pub fn get_row_seq(&self, rowid: &RowId) -> Option<&Seq> {
        self.rows.lookup(rowid).and_then(|e| e.seq.as_ref())
    }

    /// Position in the full data (roots only, in tree mode).
    pub fn get_row_index(&self, rowid: &RowId) -> Option<usize> {
        self.rows.lookup(rowid).and_then(|e| e.index)
    }

    /// Position in the after-data.
    pub fn get_vt_row_index(&self, rowid: &RowId) -> Option<usize> {
        self.rows.lookup(rowid).and_then(|e| e.flat_index)
    }

    /// Position in the rendered window.
    pub fn get_vm_row_index(&self, rowid: &RowId) -> Option<usize> {
        self.rows.lookup(rowid).and_then(|e| e.view_index)
    }

    /// Every row, in full order (depth-first in tree mode).
    pub fn full_data(&self) -> Vec<RowId> {
        match &self.tree {
            Some(tree) => tree.flatten_all(),
            None => self.full.clone(),
        }
    }

    /// Rows after filter, sort and tree expansion.
    pub fn after_data(&self) -> &[RowId] {
        &self.after
    }

    pub fn get_cell_value(&self, rowid: &RowId, column: impl Into<ColRef>) -> Option<CellValue> {
        let record = self.records.get(rowid)?;
        let column = self.get_column(column)?;
        Some(self.hooks.accessor.get_cell_value(record, column))
    }

    // =========================================================================
    // Column queries
    // =========================================================================

    pub fn get_column_id(&self, column: impl Into<ColRef>) -> Option<ColumnId> {
        self.columns.resolve(&column.into())
    }

    pub fn get_column(&self, column: impl Into<ColRef>) -> Option<&Column> {
        self.get_column_id(column).and_then(|id| self.columns.get(id))
    }

    pub fn get_column_index(&self, column: impl Into<ColRef>) -> Option<usize> {
        self.get_column_id(column)
            .and_then(|id| self.columns.column_index(id))
    }

    pub fn get_vt_column_index(&self, column: impl Into<ColRef>) -> Option<usize> {
        self.get_column_id(column)
            .and_then(|id| self.columns.vt_column_index(id))
    }

    pub fn get_vm_column_index(&self, column: impl Into<ColRef>) -> Option<usize> {
        self.get_column_id(column)
            .and_then(|id| self.columns.vm_column_index(id))
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn visible_columns(&self) -> &[ColumnId] {
        self.columns.visible()
    }

    // =========================================================================
    // Internals shared by the operation modules
    // =========================================================================

    fn notify(&self) {
        self.hooks.notifier.schedule_render();
    }

    fn tree_config(&self) -> Option<&TreeConfig> {
        self.config.tree.as_ref()
    }

    fn require_tree(&self, operation: &'static str) -> Result<&TreeStore> {
        self.tree
            .as_ref()
            .ok_or(GridError::TreeModeRequired { operation })
    }

    fn require_row(&self, rowid: &RowId) -> Result<()> {
        if self.records.contains_key(rowid) {
            Ok(())
        } else {
            Err(GridError::row_not_found(rowid))
        }
    }

    fn require_column(&self, column: impl Into<ColRef>) -> Result<ColumnId> {
        let column = column.into();
        self.columns
            .resolve(&column)
            .ok_or_else(|| GridError::column_not_found(&column))
    }

    /// Whether the row axis may window at all. Nested trees render
    /// recursively and are never windowed.
    fn y_allowed(&self) -> bool {
        self.tree.is_none() || self.config.is_tree_transform()
    }

    /// Re-evaluate row windowing after the full dataset changed.
    fn update_y_status(&mut self) {
        let allowed = self.y_allowed();
        self.scroll_y.update_status(self.records.len(), allowed);
        self.scroll_y.set_len(self.after.len());
        let viewport = self.scroll_y.viewport();
        self.scroll_y.layout(viewport);
        self.scroll_y.fit_spans(&self.merges);
        self.refresh_row_view();
    }

    fn rebuild_rows(&mut self, is_source: bool) {
        let shape = match &self.tree {
            Some(tree) => DatasetShape::Tree(tree),
            None => DatasetShape::Flat(&self.full),
        };
        self.rows.rebuild(shape, is_source);
    }

    /// Re-run filter and sort, then refresh everything derived from the
    /// after-data.
    fn handle_data(&mut self) {
        let accessor = self.hooks.accessor.clone();
        let pipeline = Pipeline {
            columns: &self.columns,
            records: &self.records,
            accessor: accessor.as_ref(),
            filter_method: self.hooks.filter_method.as_ref(),
            sort_method: self.hooks.sort_method.as_ref(),
            remote_filter: self.config.filter.remote,
            remote_sort: self.config.sort.remote,
            chronological: self.config.sort.chronological,
        };
        match &self.tree {
            Some(tree) => self.after_tree = Some(pipeline.run_tree(tree)),
            None => self.after = pipeline.run_flat(&self.full),
        }
        self.refresh_after();
    }

    /// Refresh indices after the after-data changed without re-running the
    /// pipeline (expansion, insert, remove).
    fn refresh_after(&mut self) {
        if let Some(after_tree) = &self.after_tree {
            self.after = after_tree.flatten_visible(self.tree_expand.expanded());
        }
        self.rows.refresh_after(&self.after, self.after_tree.as_ref());
        self.merges.reanchor_rows(&self.after);
        self.scroll_y.set_len(self.after.len());
        self.scroll_y.fit_spans(&self.merges);
        self.refresh_row_view();
    }

    fn refresh_row_view(&mut self) {
        let window = self.scroll_y.window();
        let rows = self.after.get(window).unwrap_or(&[]).to_vec();
        self.rows.refresh_view(&rows);
    }

    fn refresh_column_view(&mut self) {
        let window = self.scroll_x.window();
        let columns = self.columns.visible().get(window).unwrap_or(&[]).to_vec();
        self.columns.refresh_view(&columns);
    }

    /// Whether the toggle hook lets `rowid` expand or collapse.
    fn toggle_allowed(&self, kind: ExpandKind, rowid: &RowId, expanded: bool) -> bool {
        let Some(method) = &self.hooks.toggle_method else {
            return true;
        };
        let Some(row) = self.records.get(rowid) else {
            return false;
        };
        method(&ToggleParams {
            kind,
            rowid,
            row,
            expanded,
        })
    }

    fn cell_event(&self, pos: &CellPos) -> CellEvent {
        let entry = self.rows.lookup(&pos.row);
        CellEvent {
            row: pos.row.clone(),
            column: pos.column,
            row_index: entry.and_then(|e| e.index),
            vt_row_index: entry.and_then(|e| e.flat_index),
            vm_row_index: entry.and_then(|e| e.view_index),
            column_index: self.columns.column_index(pos.column),
            vt_column_index: self.columns.vt_column_index(pos.column),
            vm_column_index: self.columns.vm_column_index(pos.column),
        }
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.records.len())
            .field("after", &self.after.len())
            .field("columns", &self.columns.full().len())
            .field("tree", &self.tree.is_some())
            .field("merges", &self.merges.len())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Grid: Send);

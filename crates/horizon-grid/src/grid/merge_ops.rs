//! Merged cell spans.

use horizon_grid_core::logging::targets;

use super::Grid;
use crate::error::{GridError, Result};
use crate::model::merge::{CellSpan, MergeItem, MergeSpec, RowRef};

impl Grid {
    /// Replace every span. Returns how many were committed; rejected
    /// entries are logged and skipped.
    pub fn set_merge_cells(&mut self, specs: &[MergeSpec]) -> usize {
        self.merges.clear();
        let committed = self.commit_merges(specs);
        self.fit_windows();
        self.notify();
        committed
    }

    /// Add one span, or resize the span anchored at the same cell.
    pub fn add_merge_cell(&mut self, spec: &MergeSpec) -> Result<MergeItem> {
        let item = self.resolve_merge(spec)?;
        self.merges.add(item.clone())?;
        self.fit_windows();
        self.notify();
        Ok(item)
    }

    /// Remove the spans anchored at the cells `specs` point to. Extents in
    /// `specs` are ignored.
    pub fn remove_merge_cells(&mut self, specs: &[MergeSpec]) -> Vec<MergeItem> {
        let mut removed = Vec::new();
        for spec in specs {
            let Some((row, col)) = self.resolve_anchor(spec) else {
                continue;
            };
            if let Some(item) = self.merges.remove_at(row, col) {
                removed.push(item);
            }
        }
        if !removed.is_empty() {
            self.notify();
        }
        removed
    }

    pub fn get_merge_cells(&self) -> &[MergeItem] {
        self.merges.items()
    }

    pub fn clear_merge_cells(&mut self) {
        if self.merges.is_empty() {
            return;
        }
        self.merges.clear();
        self.notify();
    }

    /// Span state of the cell at position `view_row`, `view_col` of the
    /// rendered window.
    pub fn resolve_cell_span(&self, view_row: usize, view_col: usize) -> CellSpan {
        let row = self.scroll_y.window().start + view_row;
        let col = self.scroll_x.window().start + view_col;
        self.merges.resolve_at(row, col)
    }

    /// Commit `specs` one by one. Returns how many were accepted.
    pub(super) fn commit_merges(&mut self, specs: &[MergeSpec]) -> usize {
        let mut committed = 0;
        for spec in specs {
            match self.resolve_merge(spec).and_then(|item| self.merges.add(item)) {
                Ok(()) => committed += 1,
                Err(err) => tracing::warn!(
                    target: targets::MERGE,
                    row = ?spec.row,
                    col = %spec.col,
                    error = %err,
                    "merge span rejected"
                ),
            }
        }
        committed
    }

    /// Grow both committed windows so no span is cut.
    pub(super) fn fit_windows(&mut self) {
        if self.scroll_y.fit_spans(&self.merges) {
            self.refresh_row_view();
        }
        if self.scroll_x.fit_spans(&self.merges) {
            self.refresh_column_view();
        }
    }

    fn resolve_anchor(&self, spec: &MergeSpec) -> Option<(usize, usize)> {
        let row = match &spec.row {
            RowRef::Index(index) => Some(*index).filter(|i| *i < self.after.len()),
            RowRef::Id(rowid) => self.rows.lookup(rowid).and_then(|e| e.flat_index),
        }?;
        let column = self.columns.resolve(&spec.col)?;
        let col = self.columns.vt_column_index(column)?;
        Some((row, col))
    }

    fn resolve_merge(&self, spec: &MergeSpec) -> Result<MergeItem> {
        let Some((row, col)) = self.resolve_anchor(spec) else {
            return Err(GridError::invalid_merge(format!(
                "anchor ({:?}, {}) is not a visible cell",
                spec.row, spec.col
            )));
        };
        if row + spec.rowspan > self.after.len() || col + spec.colspan > self.columns.visible().len() {
            return Err(GridError::invalid_merge("span reaches past the data"));
        }
        let row_anchor = self.after[row].clone();
        let col_anchor = self.columns.visible()[col];
        Ok(MergeItem {
            row,
            col,
            rowspan: spec.rowspan,
            colspan: spec.colspan,
            row_anchor,
            col_anchor,
        })
    }
}

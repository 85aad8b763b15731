//! Merge-span resolver.
//!
//! A span covers a rectangle of cells in after-data rows and visible columns.
//! Its top-left cell (the anchor) renders with the span size; every other
//! covered cell is suppressed. Spans never overlap, and a 1x1 span is
//! rejected.
//!
//! Windows handed to the renderer must not cut through a span.
//! [`MergeList::expand_window`] grows a candidate window until no span
//! crosses either edge. Spans can chain (a span pulling the start back into
//! a second span), so the growth repeats until nothing changes.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use horizon_grid_core::logging::targets;

use crate::error::{GridError, Result};
use crate::model::column::{ColRef, ColumnId};
use crate::model::row_cache::RowId;

/// One of the two grid axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Vertical: rows.
    Row,
    /// Horizontal: columns.
    Column,
}

/// A row reference as accepted by merge operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowRef {
    /// Position in the after-data.
    Index(usize),
    Id(RowId),
}

impl From<usize> for RowRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<RowId> for RowRef {
    fn from(id: RowId) -> Self {
        Self::Id(id)
    }
}

fn one() -> usize {
    1
}

/// A span request, before its references are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    pub row: RowRef,
    pub col: ColRef,
    #[serde(default = "one")]
    pub rowspan: usize,
    #[serde(default = "one")]
    pub colspan: usize,
}

impl MergeSpec {
    pub fn new(row: impl Into<RowRef>, col: impl Into<ColRef>, rowspan: usize, colspan: usize) -> Self {
        Self {
            row: row.into(),
            col: col.into(),
            rowspan,
            colspan,
        }
    }
}

/// A committed span with resolved anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeItem {
    /// Anchor position in the after-data.
    pub row: usize,
    /// Anchor position among visible columns.
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
    pub row_anchor: RowId,
    pub col_anchor: ColumnId,
}

impl MergeItem {
    pub fn row_range(&self) -> Range<usize> {
        self.row..self.row + self.rowspan
    }

    pub fn col_range(&self) -> Range<usize> {
        self.col..self.col + self.colspan
    }

    fn range(&self, axis: Axis) -> Range<usize> {
        match axis {
            Axis::Row => self.row_range(),
            Axis::Column => self.col_range(),
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.row_range().contains(&row) && self.col_range().contains(&col)
    }

    pub fn intersects(&self, other: &MergeItem) -> bool {
        overlaps(&self.row_range(), &other.row_range()) && overlaps(&self.col_range(), &other.col_range())
    }

    fn is_trivial(&self) -> bool {
        self.rowspan <= 1 && self.colspan <= 1
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// How a cell renders with respect to spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSpan {
    /// Top-left cell of a span.
    Anchor { rowspan: usize, colspan: usize },
    /// Covered by the span anchored at the given position; not rendered.
    Suppressed { row: usize, col: usize },
    /// Not part of any span.
    Plain,
}

/// The committed spans of a grid.
#[derive(Debug, Clone, Default)]
pub struct MergeList {
    items: Vec<MergeItem>,
}

impl MergeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[MergeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Commit a span.
    ///
    /// A span anchored where another span is anchored replaces it. Spans that
    /// cover a single cell, have a zero extent, or overlap another span are
    /// rejected.
    pub fn add(&mut self, item: MergeItem) -> Result<()> {
        if item.rowspan == 0 || item.colspan == 0 {
            return Err(GridError::invalid_merge("span extent must be at least 1"));
        }
        if item.is_trivial() {
            return Err(GridError::invalid_merge("span covers a single cell"));
        }
        let existing = self
            .items
            .iter()
            .position(|m| m.row == item.row && m.col == item.col);
        if let Some(other) = self
            .items
            .iter()
            .enumerate()
            .find(|(i, m)| Some(*i) != existing && m.intersects(&item))
            .map(|(_, m)| m)
        {
            return Err(GridError::invalid_merge(format!(
                "overlaps the span anchored at ({}, {})",
                other.row, other.col
            )));
        }
        match existing {
            Some(i) => self.items[i] = item,
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Remove the span anchored at `(row, col)`.
    pub fn remove_at(&mut self, row: usize, col: usize) -> Option<MergeItem> {
        let pos = self.items.iter().position(|m| m.row == row && m.col == col)?;
        Some(self.items.remove(pos))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Span state of the cell at after-data row `row`, visible column `col`.
    pub fn resolve_at(&self, row: usize, col: usize) -> CellSpan {
        for item in &self.items {
            if item.row == row && item.col == col {
                return CellSpan::Anchor {
                    rowspan: item.rowspan,
                    colspan: item.colspan,
                };
            }
            if item.contains(row, col) {
                return CellSpan::Suppressed {
                    row: item.row,
                    col: item.col,
                };
            }
        }
        CellSpan::Plain
    }

    /// Grow `window` along `axis` until no span crosses its edges.
    pub fn expand_window(&self, window: Range<usize>, axis: Axis) -> Range<usize> {
        let (mut start, mut end) = (window.start, window.end);
        if self.items.is_empty() || start >= end {
            return start..end;
        }
        loop {
            let mut changed = false;
            for item in &self.items {
                let span = item.range(axis);
                if span.start < end && span.end > start {
                    if span.start < start {
                        start = span.start;
                        changed = true;
                    }
                    if span.end > end {
                        end = span.end;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        if start != window.start || end != window.end {
            tracing::trace!(
                target: targets::MERGE,
                ?axis,
                from = ?window,
                to = ?(start..end),
                "window expanded around spans"
            );
        }
        start..end
    }

    /// Shift spans after `count` rows were inserted at after-data index `at`.
    ///
    /// Spans at or below `at` move down; a span `at` falls strictly inside
    /// grows.
    pub fn rows_inserted(&mut self, at: usize, count: usize) {
        for item in &mut self.items {
            if item.row >= at {
                item.row += count;
            } else if at < item.row + item.rowspan {
                item.rowspan += count;
            }
        }
    }

    /// Shift spans after the row `rowid` at after-data index `at` was removed.
    ///
    /// A span anchored on the removed row is dropped, as is any span that
    /// shrinks to a single cell.
    pub fn row_removed(&mut self, at: usize, rowid: &RowId) -> Vec<MergeItem> {
        let mut dropped = Vec::new();
        self.items.retain_mut(|item| {
            if &item.row_anchor == rowid {
                dropped.push(item.clone());
                return false;
            }
            if item.row > at {
                item.row -= 1;
            } else if at < item.row + item.rowspan {
                item.rowspan -= 1;
            }
            if item.is_trivial() {
                dropped.push(item.clone());
                return false;
            }
            true
        });
        if !dropped.is_empty() {
            tracing::debug!(
                target: targets::MERGE,
                %rowid,
                dropped = dropped.len(),
                "spans dropped with their row"
            );
        }
        dropped
    }

    /// Drop spans whose anchor row no longer exists.
    pub fn retain_anchors<F>(&mut self, mut exists: F) -> usize
    where
        F: FnMut(&RowId) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|item| exists(&item.row_anchor));
        before - self.items.len()
    }

    /// Point every span at the row now sitting at its anchor position.
    ///
    /// Spans are positional in the after-data; sort, filter and expansion
    /// move rows under them.
    pub fn reanchor_rows(&mut self, after: &[RowId]) {
        for item in &mut self.items {
            if let Some(rowid) = after.get(item.row) {
                item.row_anchor = rowid.clone();
            }
        }
    }

    /// Whether no two committed spans intersect.
    pub fn is_disjoint(&self) -> bool {
        self.items.iter().enumerate().all(|(i, a)| {
            self.items[i + 1..].iter().all(|b| !a.intersects(b))
        })
    }
}

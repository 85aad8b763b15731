//! Viewport, virtual windows and scrolling.
//!
//! Horizontal scroll is applied as it arrives. Vertical scroll goes through
//! a trailing debounce: [`Grid::on_scroll`] only records the position and
//! the host drives [`Grid::poll_scroll`] from its frame clock (or
//! [`Grid::flush_scroll`] when it needs the window right away).

use std::ops::Range;
use std::time::Instant;

use horizon_grid_core::logging::targets;

use super::Grid;
use crate::error::Result;
use crate::events::GridEvent;
use crate::hooks::ExpandKind;
use crate::model::column::{ColRef, ColumnId};
use crate::model::merge::Axis;
use crate::model::row_cache::RowId;

/// Size of the body area in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Scroll positions and committed windows of both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollInfo {
    pub scroll_left: f32,
    pub scroll_top: f32,
    pub x_window: Range<usize>,
    pub y_window: Range<usize>,
    /// Whether column windowing is in effect.
    pub x_active: bool,
    /// Whether row windowing is in effect.
    pub y_active: bool,
}

impl Grid {
    /// Re-derive visible sizes for a new viewport or row height.
    pub fn recalculate(&mut self, viewport: Viewport, row_height: f32) {
        self.scroll_y.set_uniform_extent(row_height);
        self.scroll_y.layout(viewport.height);
        self.scroll_x.layout(viewport.width);
        self.fit_windows();
        self.refresh_row_view();
        self.refresh_column_view();
        tracing::debug!(
            target: targets::SCROLL,
            width = viewport.width,
            height = viewport.height,
            row_height,
            rows = ?self.scroll_y.window(),
            columns = ?self.scroll_x.window(),
            "viewport recalculated"
        );
        self.notify();
    }

    /// Feed scroll positions from the host.
    ///
    /// `left` is applied now; `top` is deferred until the debounce delay
    /// passed without another vertical scroll.
    pub fn on_scroll(&mut self, left: f32, top: f32, now: Instant) {
        if left != self.scroll_x.position() {
            self.apply_scroll_x(left);
        }
        if top != self.scroll_y.position() || self.y_debounce.is_pending() {
            self.y_debounce.schedule(top, now);
        }
    }

    /// Apply a deferred vertical scroll whose delay elapsed. Returns whether
    /// one was applied.
    pub fn poll_scroll(&mut self, now: Instant) -> bool {
        match self.y_debounce.poll(now) {
            Some(top) => {
                self.apply_scroll_y(top);
                true
            }
            None => false,
        }
    }

    /// Apply a deferred vertical scroll without waiting.
    pub fn flush_scroll(&mut self) -> bool {
        match self.y_debounce.flush() {
            Some(top) => {
                self.apply_scroll_y(top);
                true
            }
            None => false,
        }
    }

    /// Scroll both axes at once. `None` keeps an axis where it is.
    pub fn scroll_to(&mut self, left: Option<f32>, top: Option<f32>) {
        if let Some(left) = left {
            self.apply_scroll_x(left);
        }
        if let Some(top) = top {
            self.y_debounce.cancel();
            self.apply_scroll_y(top);
        }
    }

    /// Bring `rowid` (and optionally a column) into view.
    ///
    /// Collapsed tree ancestors are expanded first, as far as the toggle
    /// hook allows. A row hidden by the filter stays hidden; the call
    /// succeeds without scrolling.
    pub fn scroll_to_row(&mut self, rowid: &RowId, column: Option<ColRef>) -> Result<()> {
        self.require_row(rowid)?;
        let column = column.map(|c| self.require_column(c)).transpose()?;
        self.expand_ancestors(rowid);
        if let Some(index) = self.rows.lookup(rowid).and_then(|e| e.flat_index) {
            let top = self.scroll_y.offset_of(index);
            self.y_debounce.cancel();
            self.apply_scroll_y(top);
        }
        if let Some(column) = column {
            self.scroll_to_column_id(column);
        }
        Ok(())
    }

    /// Bring a column into view.
    pub fn scroll_to_column(&mut self, column: impl Into<ColRef>) -> Result<()> {
        let id = self.require_column(column)?;
        self.scroll_to_column_id(id);
        Ok(())
    }

    pub fn get_scroll(&self) -> ScrollInfo {
        ScrollInfo {
            scroll_left: self.scroll_x.position(),
            scroll_top: self.scroll_y.position(),
            x_window: self.scroll_x.window(),
            y_window: self.scroll_y.window(),
            x_active: self.scroll_x.is_active(),
            y_active: self.scroll_y.is_active(),
        }
    }

    /// Back to the top-left corner.
    pub fn clear_scroll(&mut self) {
        self.y_debounce.cancel();
        self.scroll_x.reset();
        self.scroll_y.reset();
        self.fit_windows();
        self.refresh_row_view();
        self.refresh_column_view();
        self.notify();
    }

    /// Rows of the rendered window.
    pub fn table_data(&self) -> &[RowId] {
        self.after.get(self.scroll_y.window()).unwrap_or(&[])
    }

    /// Columns of the rendered window.
    pub fn table_column(&self) -> &[ColumnId] {
        self.columns
            .visible()
            .get(self.scroll_x.window())
            .unwrap_or(&[])
    }

    fn scroll_to_column_id(&mut self, column: ColumnId) {
        if let Some(index) = self.columns.vt_column_index(column) {
            let left = self.scroll_x.offset_of(index);
            self.apply_scroll_x(left);
        }
    }

    fn expand_ancestors(&mut self, rowid: &RowId) {
        let Some(tree) = &self.tree else {
            return;
        };
        let collapsed: Vec<RowId> = tree
            .ancestors(rowid)
            .into_iter()
            .filter(|id| !self.tree_expand.is_expanded(id))
            .filter(|id| self.toggle_allowed(ExpandKind::Tree, id, true))
            .collect();
        if collapsed.is_empty() {
            return;
        }
        let plan = self
            .tree_expand
            .set_expanded(tree, &collapsed, true, false, |_| false);
        self.refresh_after();
        for row in plan.expanded {
            self.dispatch_event(GridEvent::ToggleTreeExpand {
                row,
                expanded: true,
            });
        }
    }

    fn apply_scroll_x(&mut self, left: f32) {
        let committed = self.scroll_x.on_scroll(left, &self.merges);
        if committed {
            self.refresh_column_view();
        }
        self.dispatch_event(GridEvent::Scroll {
            axis: Axis::Column,
            position: self.scroll_x.position(),
            window: self.scroll_x.window(),
        });
        if committed {
            self.notify();
        }
    }

    fn apply_scroll_y(&mut self, top: f32) {
        let committed = self.scroll_y.on_scroll(top, &self.merges);
        if committed {
            self.refresh_row_view();
        }
        self.dispatch_event(GridEvent::Scroll {
            axis: Axis::Row,
            position: self.scroll_y.position(),
            window: self.scroll_y.window(),
        });
        if committed {
            self.notify();
        }
    }
}

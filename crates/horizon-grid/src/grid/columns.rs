//! Column loading and visibility.

use horizon_grid_core::logging::targets;

use super::Grid;
use crate::error::Result;
use crate::model::column::{ColRef, Column, ColumnId};

impl Grid {
    /// Replace every column.
    ///
    /// Column ids from a previous load are invalid afterwards, so the active
    /// edit and the selection are dropped along with all spans. Configured
    /// default sorts are applied to the new columns.
    pub fn load_column(&mut self, columns: Vec<Column>) {
        self.columns.load(columns);
        if self.columns.is_group() && self.config.scroll_x.enabled {
            tracing::warn!(
                target: targets::COLUMNS,
                "grouped header; horizontal windowing disabled"
            );
        }
        self.edit.close();
        self.edit.clear_selected();
        self.focus_queue.cancel_where(|_| true);
        self.merges.clear();
        self.apply_default_sort();
        self.refresh_x();
        self.handle_data();
        self.notify();
    }

    /// Reload columns, keeping nothing from the previous set.
    pub fn reload_column(&mut self, columns: Vec<Column>) {
        self.load_column(columns);
    }

    /// Hide a column, or every leaf of a group.
    ///
    /// Returns whether the visible columns changed.
    pub fn hide_column(&mut self, column: impl Into<ColRef>) -> Result<bool> {
        let id = self.column_or_group(column.into())?;
        let changed = self.columns.set_visible(id, false);
        self.after_visibility_change(changed);
        Ok(changed)
    }

    /// Show a column, or every leaf of a group.
    pub fn show_column(&mut self, column: impl Into<ColRef>) -> Result<bool> {
        let id = self.column_or_group(column.into())?;
        let changed = self.columns.set_visible(id, true);
        self.after_visibility_change(changed);
        Ok(changed)
    }

    /// Restore the visibility every column was defined with.
    pub fn reset_column(&mut self) -> bool {
        let changed = self.columns.reset_visibility();
        self.after_visibility_change(changed);
        changed
    }

    fn column_or_group(&self, column: ColRef) -> Result<ColumnId> {
        match column {
            ColRef::Id(id) if self.columns.entry(id).is_some() => Ok(id),
            other => self.require_column(other),
        }
    }

    fn after_visibility_change(&mut self, changed: bool) {
        if !changed {
            return;
        }
        if !self.merges.is_empty() {
            tracing::debug!(
                target: targets::MERGE,
                spans = self.merges.len(),
                "visible columns changed; spans cleared"
            );
            self.merges.clear();
        }
        self.refresh_x();
        self.notify();
    }

    fn apply_default_sort(&mut self) {
        let defaults = self.config.sort.default_sort.clone();
        let take = if self.config.sort.multiple {
            defaults.len()
        } else {
            1
        };
        for default in defaults.iter().take(take) {
            match self.columns.by_field(&default.field) {
                Some(id) => {
                    let time = self.next_sort_time();
                    if let Some(column) = self.columns.get_mut(id) {
                        column.order = Some(default.order);
                        column.sort_time = time;
                    }
                }
                None => tracing::warn!(
                    target: targets::COLUMNS,
                    field = default.field,
                    "default sort names an unknown column"
                ),
            }
        }
    }

    /// Re-evaluate column windowing after the visible columns changed.
    pub(super) fn refresh_x(&mut self) {
        let widths = self.columns.visible_widths();
        self.scroll_x.set_extents(&widths);
        self.scroll_x
            .update_status(widths.len(), !self.columns.is_group());
        let viewport = self.scroll_x.viewport();
        self.scroll_x.layout(viewport);
        self.scroll_x.fit_spans(&self.merges);
        self.refresh_column_view();
    }
}

//! Sort and filter state.
//!
//! Sort and filter conditions live on the columns. Every change re-runs the
//! pipeline, reports the new state through an event and asks for a repaint.

use horizon_grid_core::logging::targets;

use super::Grid;
use crate::error::{GridError, Result};
use crate::events::GridEvent;
use crate::model::column::{ColRef, ColumnId};
use crate::model::pipeline::{FilterOption, SortOrder, SortSpec};
use crate::record::CellValue;

impl Grid {
    /// Sort by `column`, or clear its sort with `None`.
    ///
    /// Unless multi-column sort is on, every other sort is cleared.
    pub fn sort(&mut self, column: impl Into<ColRef>, order: Option<SortOrder>) -> Result<()> {
        let id = self.require_column(column)?;
        if !self.config.sort.multiple {
            self.reset_sort_except(Some(id));
        }
        self.set_column_order(id, order);
        self.after_sort_change(Some(id), order);
        Ok(())
    }

    /// Cycle the sort of a sortable column through ascending, descending
    /// and none. Columns not marked sortable are left alone.
    pub fn toggle_sort(&mut self, column: impl Into<ColRef>) -> Result<Option<SortOrder>> {
        let id = self.require_column(column)?;
        let Some(current) = self.columns.get(id).filter(|c| c.sortable).map(|c| c.order()) else {
            return Ok(None);
        };
        let next = match current {
            None => Some(SortOrder::Asc),
            Some(SortOrder::Asc) => Some(SortOrder::Desc),
            Some(SortOrder::Desc) => None,
        };
        self.sort(id, next)?;
        Ok(next)
    }

    /// Replace every sort condition. Later entries rank lower.
    pub fn sort_by(&mut self, sorts: Vec<SortSpec>) -> Result<()> {
        for spec in &sorts {
            if self.columns.get(spec.column).is_none_or(|c| c.is_group()) {
                return Err(GridError::column_not_found(ColRef::Id(spec.column)));
            }
        }
        let take = if self.config.sort.multiple {
            sorts.len()
        } else {
            1
        };
        self.reset_sort_except(None);
        for spec in sorts.iter().take(take) {
            self.set_column_order(spec.column, Some(spec.order));
        }
        let first = sorts.first();
        self.after_sort_change(first.map(|s| s.column), first.map(|s| s.order));
        Ok(())
    }

    /// Clear the sort of one column, or of every column.
    pub fn clear_sort(&mut self, column: Option<ColRef>) -> Result<()> {
        match column {
            Some(column) => {
                let id = self.require_column(column)?;
                self.set_column_order(id, None);
                self.after_sort_change(Some(id), None);
            }
            None => {
                self.reset_sort_except(None);
                self.after_sort_change(None, None);
            }
        }
        Ok(())
    }

    pub fn is_sort(&self, column: impl Into<ColRef>) -> bool {
        self.get_column(column).is_some_and(|c| c.order().is_some())
    }

    /// Active sort conditions, highest rank first.
    pub fn get_sort_columns(&self) -> Vec<SortSpec> {
        let mut sorted = self.columns.sorted();
        if self.config.sort.chronological {
            sorted.sort_by_key(|(_, _, time)| *time);
        }
        sorted
            .into_iter()
            .map(|(column, order, _)| SortSpec { column, order })
            .collect()
    }

    /// Replace the filter options of a column.
    pub fn set_filter(&mut self, column: impl Into<ColRef>, options: Vec<FilterOption>) -> Result<()> {
        let id = self.require_column(column)?;
        if let Some(column) = self.columns.get_mut(id) {
            column.filters = options;
        }
        self.after_filter_change(Some(id));
        Ok(())
    }

    /// Check or uncheck the filter options of a column whose value is in
    /// `values`.
    pub fn set_filter_checked(
        &mut self,
        column: impl Into<ColRef>,
        values: &[CellValue],
        checked: bool,
    ) -> Result<()> {
        let id = self.require_column(column)?;
        let mut changed = false;
        if let Some(column) = self.columns.get_mut(id) {
            for option in column.filters.iter_mut().filter(|o| values.contains(&o.value)) {
                changed |= option.checked != checked;
                option.checked = checked;
            }
        }
        if changed {
            self.after_filter_change(Some(id));
        }
        Ok(())
    }

    /// Uncheck the filter options of one column, or of every column.
    pub fn clear_filter(&mut self, column: Option<ColRef>) -> Result<()> {
        let ids = match column {
            Some(column) => vec![self.require_column(column)?],
            None => self.columns.filtered(),
        };
        for id in &ids {
            if let Some(column) = self.columns.get_mut(*id) {
                column.filters.iter_mut().for_each(|o| o.checked = false);
            }
        }
        let single = match ids.as_slice() {
            [id] => Some(*id),
            _ => None,
        };
        self.after_filter_change(single);
        Ok(())
    }

    /// Whether `column` (or any column, with `None`) has a checked filter.
    pub fn is_filter(&self, column: Option<ColRef>) -> bool {
        match column {
            Some(column) => self.get_column(column).is_some_and(|c| c.is_filtered()),
            None => !self.columns.filtered().is_empty(),
        }
    }

    /// Re-run filter and sort after rows changed in place.
    pub fn update_data(&mut self) {
        self.handle_data();
        self.update_y_status();
        self.notify();
    }

    /// Next value of the sort clock, used to rank sorts chronologically.
    pub(super) fn next_sort_time(&mut self) -> u64 {
        self.sort_clock += 1;
        self.sort_clock
    }

    fn set_column_order(&mut self, id: ColumnId, order: Option<SortOrder>) {
        let time = match order {
            Some(_) => self.next_sort_time(),
            None => 0,
        };
        if let Some(column) = self.columns.get_mut(id) {
            column.order = order;
            column.sort_time = time;
        }
    }

    fn reset_sort_except(&mut self, keep: Option<ColumnId>) {
        for (id, _, _) in self.columns.sorted() {
            if Some(id) != keep {
                self.set_column_order(id, None);
            }
        }
    }

    fn after_sort_change(&mut self, column: Option<ColumnId>, order: Option<SortOrder>) {
        let sorts = self.get_sort_columns();
        tracing::debug!(target: targets::PIPELINE, sorts = sorts.len(), "sort changed");
        self.handle_data();
        self.dispatch_event(GridEvent::SortChange {
            column,
            order,
            sorts,
        });
        self.notify();
    }

    fn after_filter_change(&mut self, column: Option<ColumnId>) {
        let filtered = self.columns.filtered();
        tracing::debug!(
            target: targets::PIPELINE,
            filtered = filtered.len(),
            "filter changed"
        );
        self.handle_data();
        self.update_y_status();
        self.dispatch_event(GridEvent::FilterChange { column, filtered });
        self.notify();
    }
}

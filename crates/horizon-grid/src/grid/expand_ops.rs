//! Row detail expansion and checkbox selection.

use futures_util::future::join_all;
use serde_json::Value;

use horizon_grid_core::logging::targets;

use super::{ExpandOutcome, Grid};
use crate::events::GridEvent;
use crate::hooks::ExpandKind;
use crate::model::row_cache::RowId;
use crate::record::{Record, set_path};

impl Grid {
    // =========================================================================
    // Row detail expansion
    // =========================================================================

    /// Expand or collapse row details.
    ///
    /// With `expand.lazy` and a row detail loader, a row is loaded before it
    /// first expands. A failed load leaves the row collapsed.
    pub async fn set_row_expand(&mut self, rows: &[RowId], expanded: bool) -> Vec<(RowId, ExpandOutcome)> {
        let mut outcomes = Vec::with_capacity(rows.len());
        let mut allowed = Vec::with_capacity(rows.len());
        for rowid in rows {
            if !self.records.contains_key(rowid) {
                continue;
            }
            if self.toggle_allowed(ExpandKind::Row, rowid, expanded) {
                allowed.push(rowid.clone());
            } else {
                outcomes.push((rowid.clone(), ExpandOutcome::Refused));
            }
        }

        let lazy = self.config.expand.lazy && self.hooks.load_row_detail.is_some();
        let plan = {
            let cache = &self.rows;
            self.row_expand.set_expanded(
                &allowed,
                expanded,
                self.config.expand.accordion,
                |rowid| lazy && cache.lookup(rowid).is_some_and(|e| !e.expand_loaded),
            )
        };
        let mut planned = ExpandOutcome::from_plan(&allowed, &plan);
        self.emit_row_toggles(&plan.expanded, true);
        self.emit_row_toggles(&plan.collapsed, false);
        if !plan.load.is_empty() {
            for (rowid, outcome) in self.load_row_details(&plan.load).await {
                if let Some(slot) = planned.iter_mut().find(|(id, _)| id == &rowid) {
                    slot.1 = outcome;
                }
            }
        }
        self.notify();
        outcomes.extend(planned);
        outcomes
    }

    async fn load_row_details(&mut self, rows: &[RowId]) -> Vec<(RowId, ExpandOutcome)> {
        let Some(loader) = self.hooks.load_row_detail.clone() else {
            return Vec::new();
        };
        let mut pending = Vec::with_capacity(rows.len());
        let mut futures = Vec::with_capacity(rows.len());
        for rowid in rows {
            match self.records.get(rowid) {
                Some(record) => {
                    futures.push(loader(record));
                    pending.push(rowid.clone());
                }
                None => {
                    self.row_expand.finish_load(rowid, false);
                }
            }
        }
        let results = join_all(futures).await;

        let mut outcomes = Vec::with_capacity(pending.len());
        for (rowid, result) in pending.into_iter().zip(results) {
            let success = result.is_ok();
            if let Some(entry) = self.rows.lookup_mut(&rowid) {
                entry.expand_loaded = success;
            }
            let opened = self.row_expand.finish_load(&rowid, success);
            let outcome = match result {
                Ok(()) => ExpandOutcome::Loaded { children: 0 },
                Err(err) => {
                    tracing::warn!(
                        target: targets::GRID,
                        %rowid,
                        error = %err,
                        "row detail failed to load"
                    );
                    ExpandOutcome::LoadFailed(err)
                }
            };
            if opened {
                self.emit_row_toggles(std::slice::from_ref(&rowid), true);
            }
            outcomes.push((rowid, outcome));
        }
        outcomes
    }

    pub async fn toggle_row_expand(&mut self, rowid: &RowId) -> ExpandOutcome {
        let expanded = !self.row_expand.is_expanded(rowid);
        self.set_row_expand(std::slice::from_ref(rowid), expanded)
            .await
            .into_iter()
            .find(|(id, _)| id == rowid)
            .map(|(_, outcome)| outcome)
            .unwrap_or(ExpandOutcome::Unchanged)
    }

    /// Collapse every row detail.
    pub fn clear_row_expand(&mut self) {
        let collapsed = self.row_expand.clear();
        self.emit_row_toggles(&collapsed, false);
        self.notify();
    }

    pub fn is_row_expand_by_row(&self, rowid: &RowId) -> bool {
        self.row_expand.is_expanded(rowid)
    }

    pub fn is_row_expand_loaded(&self, rowid: &RowId) -> bool {
        self.rows.lookup(rowid).is_some_and(|e| e.expand_loaded)
    }

    /// Collapse the row and mark its detail as not loaded.
    pub fn clear_row_expand_loaded(&mut self, rowid: &RowId) {
        if self.row_expand.collapse(rowid) {
            self.emit_row_toggles(std::slice::from_ref(rowid), false);
        }
        if let Some(entry) = self.rows.lookup_mut(rowid) {
            entry.expand_loaded = false;
        }
        self.notify();
    }

    /// Load the row detail again and expand the row.
    pub async fn reload_row_expand(&mut self, rowid: &RowId) -> ExpandOutcome {
        self.clear_row_expand_loaded(rowid);
        self.set_row_expand(std::slice::from_ref(rowid), true)
            .await
            .into_iter()
            .find(|(id, _)| id == rowid)
            .map(|(_, outcome)| outcome)
            .unwrap_or(ExpandOutcome::Unchanged)
    }

    /// Rows with an expanded detail, in full order.
    pub fn get_row_expand_records(&self) -> Vec<&Record> {
        self.row_expand
            .expanded_in(&self.full_data())
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    fn emit_row_toggles(&self, rows: &[RowId], expanded: bool) {
        for rowid in rows {
            self.dispatch_event(GridEvent::ToggleRowExpand {
                row: rowid.clone(),
                expanded,
            });
        }
    }

    // =========================================================================
    // Checkbox selection
    // =========================================================================

    /// Check or uncheck rows. Returns every row whose state changed,
    /// including cascaded tree rows.
    pub fn set_checkbox_row(&mut self, rows: &[RowId], checked: bool) -> Vec<RowId> {
        let allowed: Vec<RowId> = rows
            .iter()
            .filter(|id| self.check_allowed(id))
            .cloned()
            .collect();
        let changed = self.checkbox.set_checked(
            self.tree.as_ref(),
            &allowed,
            checked,
            self.config.checkbox.check_strictly,
        );
        self.finish_checkbox_change(&changed, checked);
        changed
    }

    /// Flip one row. Returns its new state.
    pub fn toggle_checkbox_row(&mut self, rowid: &RowId) -> bool {
        let checked = !self.checkbox.is_checked(rowid);
        self.set_checkbox_row(std::slice::from_ref(rowid), checked);
        self.checkbox.is_checked(rowid)
    }

    /// Check or uncheck every row that passed the filter (the whole after
    /// tree in tree mode). Rows refused by the check hook keep their state.
    pub fn set_all_checkbox_row(&mut self, checked: bool) -> Vec<RowId> {
        let scope = match &self.after_tree {
            Some(tree) => tree.flatten_all(),
            None => self.after.clone(),
        };
        let rows: Vec<RowId> = scope
            .into_iter()
            .filter(|id| self.check_allowed(id) && self.checkbox.is_checked(id) != checked)
            .collect();
        self.checkbox.set_all(&rows, checked);
        self.finish_checkbox_change(&rows, checked);
        rows
    }

    /// Uncheck everything. The check hook is not consulted.
    pub fn clear_checkbox_row(&mut self) -> Vec<RowId> {
        let cleared = self.checkbox.clear();
        self.finish_checkbox_change(&cleared, false);
        cleared
    }

    /// Checked rows, in full order.
    pub fn get_checkbox_records(&self) -> Vec<&Record> {
        self.checkbox
            .checked_in(&self.full_data())
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    pub fn is_checked_by_row(&self, rowid: &RowId) -> bool {
        self.checkbox.is_checked(rowid)
    }

    pub fn is_indeterminate_by_row(&self, rowid: &RowId) -> bool {
        self.checkbox.is_indeterminate(rowid)
    }

    /// Whether every row of the after-data is checked.
    pub fn is_all_checkbox_checked(&self) -> bool {
        self.checkbox.all_checked(&self.after)
    }

    fn check_allowed(&self, rowid: &RowId) -> bool {
        let Some(record) = self.records.get(rowid) else {
            return false;
        };
        self.hooks
            .check_method
            .as_ref()
            .is_none_or(|method| method(record))
    }

    fn finish_checkbox_change(&mut self, changed: &[RowId], checked: bool) {
        if changed.is_empty() {
            return;
        }
        self.mirror_check_field(changed);
        self.dispatch_event(GridEvent::CheckboxChange {
            rows: changed.to_vec(),
            checked,
        });
        self.notify();
    }

    /// Write the checked state of `rows` into the configured check field.
    pub(super) fn mirror_check_field(&mut self, rows: &[RowId]) {
        let Some(field) = self.config.checkbox.check_field.as_deref() else {
            return;
        };
        for rowid in rows {
            let checked = self.checkbox.is_checked(rowid);
            if let Some(record) = self.records.get_mut(rowid) {
                set_path(record, field, Value::Bool(checked));
            }
        }
    }
}

//! Selection, activation, commit and focus.

use futures_util::future::BoxFuture;

use horizon_grid_core::logging::{span_names, targets};
use horizon_grid_core::{Lane, PerfSpan};

use super::Grid;
use crate::error::ValidationError;
use crate::events::{CellEvent, GridEvent};
use crate::hooks::{ValidatePhase, ValidateTarget};
use crate::model::column::{ColRef, ColumnId};
use crate::model::row_cache::RowId;
use crate::record::CellValue;
use crate::view::edit::{ActivateOutcome, ActivationPhase, CellGesture, CellPos, EditCommit, EditMode, Transition};

impl Grid {
    /// Make a cell the active edit target.
    ///
    /// When another target is active it is committed and, with a validator
    /// installed, validated first. A rejection keeps it active and is
    /// returned as [`ActivateOutcome::Blocked`].
    pub async fn set_edit_cell(&mut self, rowid: &RowId, column: impl Into<ColRef>) -> ActivateOutcome {
        let Some(column) = self.get_column_id(column) else {
            return ActivateOutcome::Ignored;
        };
        self.activate_cell(CellPos::new(rowid.clone(), column)).await
    }

    /// Activate `rowid` at its first editable visible column.
    pub async fn set_edit_row(&mut self, rowid: &RowId) -> ActivateOutcome {
        let Some(column) = self.columns.first_editable() else {
            return ActivateOutcome::Ignored;
        };
        self.activate_cell(CellPos::new(rowid.clone(), column)).await
    }

    async fn activate_cell(&mut self, next: CellPos) -> ActivateOutcome {
        if !self.is_editable(&next) {
            return ActivateOutcome::Ignored;
        }
        let transition = self.edit.classify(&next);
        match &transition {
            Transition::Same => return ActivateOutcome::Unchanged,
            Transition::SwitchColumn { previous } => {
                if let Some(value) = self.edit.take_update(previous.column) {
                    self.write_cell(&previous.row, vec![(previous.column, value)]);
                }
                if let Some(validator) = &self.hooks.validator {
                    validator.clear_validate();
                }
                self.clear_selection_on_activate();
                let initial = self.cell_value_at(&next);
                self.edit.activate(next.clone(), initial);
                self.focus_queue.post(Lane::Macrotask, next);
                self.notify();
                return ActivateOutcome::SwitchedColumn;
            }
            Transition::Fresh | Transition::Replace { .. } => {}
        }

        if !self.before_edit_allows(&next) {
            tracing::debug!(target: targets::EDIT, row = %next.row, "activation refused");
            self.dispatch_event(GridEvent::EditDisabled(self.cell_event(&next)));
            return ActivateOutcome::Disabled;
        }

        if let Transition::Replace { previous } = transition {
            self.edit.begin_commit(&next);
            self.commit_models();
            if let Err(err) = self.validate_active(ValidatePhase::Blur).await {
                tracing::debug!(
                    target: targets::EDIT,
                    row = %previous.row,
                    rule = %err.rule,
                    "previous cell failed validation; activation blocked"
                );
                self.edit.abort_activation();
                self.notify();
                return ActivateOutcome::Blocked(err);
            }
            self.close_active();
            self.edit.enter_activate_next(&next);
        }

        self.clear_selection_on_activate();
        let initial = self.cell_value_at(&next);
        self.edit.activate(next.clone(), initial);
        self.focus_queue.post(Lane::NextTick, next.clone());
        self.dispatch_event(GridEvent::EditActived(self.cell_event(&next)));
        self.notify();
        ActivateOutcome::Activated
    }

    /// Write pending values back and close the active edit without
    /// validating. Returns whether anything was active.
    pub fn clear_edit(&mut self) -> bool {
        if self.edit.actived().is_none() {
            return false;
        }
        self.commit_models();
        self.close_active();
        self.notify();
        true
    }

    /// Write pending values back, validate, and close the edit when valid.
    pub async fn commit_edit(&mut self) -> EditCommit {
        if self.edit.actived().is_none() {
            return EditCommit::Idle;
        }
        self.commit_models();
        if let Err(err) = self.validate_active(ValidatePhase::Commit).await {
            self.notify();
            return EditCommit::Invalid(err);
        }
        self.close_active();
        self.notify();
        EditCommit::Closed
    }

    /// Change the pending value of the active cell. The row is written on
    /// commit.
    pub fn set_edit_value(&mut self, value: CellValue) -> bool {
        let Some(column) = self.edit.actived().map(|pos| pos.column) else {
            return false;
        };
        let changed = self.edit.set_model(column, value);
        if changed {
            self.notify();
        }
        changed
    }

    /// Pending value of the active cell.
    pub fn get_edit_value(&self) -> Option<&CellValue> {
        let column = self.edit.actived()?.column;
        self.edit.model(column).map(|model| &model.value)
    }

    /// Select a cell. Requires `mouse.selected`; selecting the active cell
    /// or the current selection is a no-op. An active edit elsewhere is
    /// closed first.
    pub fn select_cell(&mut self, rowid: &RowId, column: impl Into<ColRef>) -> bool {
        if !self.config.mouse.selected || !self.records.contains_key(rowid) {
            return false;
        }
        let Some(column) = self.get_column_id(column) else {
            return false;
        };
        let pos = CellPos::new(rowid.clone(), column);
        if !self.edit.can_select(&pos) {
            return false;
        }
        self.clear_edit();
        self.edit.select(pos.clone());
        self.dispatch_event(GridEvent::CellSelected(self.cell_event(&pos)));
        self.notify();
        true
    }

    pub fn clear_selected(&mut self) -> bool {
        let cleared = self.edit.clear_selected().is_some();
        if cleared {
            self.notify();
        }
        cleared
    }

    /// Route a pointer gesture on a body cell.
    ///
    /// A gesture matching the configured trigger activates the cell. Any
    /// other click selects it, which reports [`ActivateOutcome::Ignored`].
    pub async fn handle_cell_gesture(
        &mut self,
        rowid: &RowId,
        column: impl Into<ColRef>,
        gesture: CellGesture,
    ) -> ActivateOutcome {
        let activates = self
            .config
            .edit
            .as_ref()
            .is_some_and(|edit| edit.trigger.activates(gesture));
        if activates {
            return self.set_edit_cell(rowid, column).await;
        }
        if gesture == CellGesture::Click {
            self.select_cell(rowid, column);
        }
        ActivateOutcome::Ignored
    }

    /// Run deferred work: drain one scheduler turn, flush queued event
    /// slots, then move focus into cells that are still active.
    ///
    /// Returns how many tasks and queued slots ran.
    pub fn settle(&mut self) -> usize {
        let _perf = PerfSpan::new(span_names::SETTLE);
        let tasks = self.focus_queue.drain_turn();
        let flushed = self.events.signal().flush_queued();
        if let Some(focus) = self.hooks.focus.clone() {
            for pos in &tasks {
                if self.edit.actived() == Some(pos) {
                    focus.focus_cell(pos);
                }
            }
        }
        tracing::trace!(target: targets::EDIT, tasks = tasks.len(), flushed, "settled");
        tasks.len() + flushed
    }

    pub fn activation_phase(&self) -> &ActivationPhase {
        self.edit.phase()
    }

    /// The active cell with its indices.
    pub fn get_actived(&self) -> Option<CellEvent> {
        self.edit.actived().map(|pos| self.cell_event(pos))
    }

    /// The selected cell with its indices.
    pub fn get_selected_cell(&self) -> Option<CellEvent> {
        self.edit.selected().map(|pos| self.cell_event(pos))
    }

    pub fn is_edit_by_row(&self, rowid: &RowId) -> bool {
        self.edit.is_edit_by_row(rowid)
    }

    fn is_editable(&self, pos: &CellPos) -> bool {
        self.config.edit.is_some()
            && self.records.contains_key(&pos.row)
            && self.columns.get(pos.column).is_some_and(|c| c.editable && !c.is_group())
    }

    fn before_edit_allows(&self, pos: &CellPos) -> bool {
        let Some(hook) = &self.hooks.before_edit else {
            return true;
        };
        match (self.records.get(&pos.row), self.columns.get(pos.column)) {
            (Some(record), Some(column)) => hook(record, column),
            _ => false,
        }
    }

    fn cell_value_at(&self, pos: &CellPos) -> CellValue {
        match (self.records.get(&pos.row), self.columns.get(pos.column)) {
            (Some(record), Some(column)) => self.hooks.accessor.get_cell_value(record, column),
            _ => CellValue::Null,
        }
    }

    /// Write changed pending values into the active row.
    fn commit_models(&mut self) {
        let Some(row) = self.edit.actived().map(|pos| pos.row.clone()) else {
            return;
        };
        let updates = self.edit.take_updates();
        self.write_cell(&row, updates);
    }

    fn write_cell(&mut self, row: &RowId, updates: Vec<(ColumnId, CellValue)>) {
        if updates.is_empty() {
            return;
        }
        let accessor = self.hooks.accessor.clone();
        let Some(record) = self.records.get_mut(row) else {
            return;
        };
        for (column, value) in updates {
            if let Some(column) = self.columns.get(column) {
                accessor.set_cell_value(record, column, value);
            }
        }
        tracing::trace!(target: targets::EDIT, %row, "pending values written");
    }

    /// With mouse selection on, an activation drops the selected cell.
    fn clear_selection_on_activate(&mut self) {
        if self.config.mouse.selected {
            self.edit.clear_selected();
        }
    }

    async fn validate_active(&mut self, phase: ValidatePhase) -> Result<(), ValidationError> {
        match self.validation(phase) {
            Some(pending) => pending.await,
            None => Ok(()),
        }
    }

    /// The validator future for the active target, if a validator is
    /// installed.
    fn validation(&self, phase: ValidatePhase) -> Option<BoxFuture<'static, Result<(), ValidationError>>> {
        let validator = self.hooks.validator.clone()?;
        let active = self.edit.actived().cloned()?;
        let record = self.records.get(&active.row).cloned()?;
        let (column, field) = match self.edit.mode() {
            EditMode::Cell => (
                Some(active.column),
                self.columns.get(active.column).and_then(|c| c.field.clone()),
            ),
            EditMode::Row => (None, None),
        };
        Some(validator.trigger_validate(
            phase,
            ValidateTarget {
                row: active.row,
                record,
                column,
                field,
            },
        ))
    }

    /// Close the active target and report it. Pending values are dropped,
    /// so callers that keep them write them back first.
    pub(super) fn close_active(&mut self) -> Option<CellPos> {
        let pos = self.edit.close()?;
        if let Some(validator) = &self.hooks.validator {
            validator.clear_validate();
        }
        self.focus_queue.cancel_where(|queued| queued.row == pos.row);
        self.dispatch_event(GridEvent::EditClosed(self.cell_event(&pos)));
        Some(pos)
    }
}

//! Edit and selection state machine.
//!
//! At most one cell is selected and at most one cell (or row, in
//! [`EditMode::Row`]) is active. Switching the active target runs in two
//! explicit phases:
//!
//! 1. [`ActivationPhase::CommitPending`]: pending values of the previous
//!    target are written back and, when a validator is installed, the
//!    previous target is validated
//! 2. [`ActivationPhase::ActivateNext`]: the next target takes over
//!
//! [`EditStore`] only tracks state. Hooks, events and row writes are driven
//! by the grid facade.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::column::ColumnId;
use crate::model::row_cache::RowId;
use crate::record::CellValue;

/// Granularity of the active target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// One cell is active at a time.
    #[default]
    Cell,
    /// A whole row is active; moving between its columns keeps it active.
    Row,
}

impl EditMode {
    /// Whether `a` and `b` address the same edit target in this mode.
    pub fn same_target(self, a: &CellPos, b: &CellPos) -> bool {
        match self {
            EditMode::Cell => a == b,
            EditMode::Row => a.row == b.row,
        }
    }
}

/// Which pointer gesture activates a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditTrigger {
    #[default]
    Click,
    DblClick,
    /// Only explicit calls activate.
    Manual,
}

/// Pointer gesture reported by the host on a body cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellGesture {
    Click,
    DblClick,
}

impl EditTrigger {
    /// Whether `gesture` should activate editing.
    pub fn activates(self, gesture: CellGesture) -> bool {
        matches!(
            (self, gesture),
            (EditTrigger::Click, CellGesture::Click) | (EditTrigger::DblClick, CellGesture::DblClick)
        )
    }
}

/// A cell address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellPos {
    pub row: RowId,
    pub column: ColumnId,
}

impl CellPos {
    pub fn new(row: RowId, column: ColumnId) -> Self {
        Self { row, column }
    }
}

/// Pending value of one column of the active row.
#[derive(Debug, Clone, PartialEq)]
pub struct CellModel {
    pub value: CellValue,
    /// Set once the value was changed and not yet written to the row.
    pub update: bool,
}

/// Where an activation currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActivationPhase {
    #[default]
    Idle,
    /// The previous target is being committed and validated.
    CommitPending { previous: CellPos, next: CellPos },
    /// The previous target is gone; `next` is taking over.
    ActivateNext { next: CellPos },
}

/// How a requested activation relates to the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing was active.
    Fresh,
    /// Exactly this cell is already active.
    Same,
    /// Row mode, same row, different column.
    SwitchColumn { previous: CellPos },
    /// A different target is active and must be closed first.
    Replace { previous: CellPos },
}

/// Result of an activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivateOutcome {
    /// A new target became active.
    Activated,
    /// Row mode: only the active column moved.
    SwitchedColumn,
    /// The target was already active.
    Unchanged,
    /// The before-edit hook refused.
    Disabled,
    /// Missing row or column, column not editable, or editing off.
    Ignored,
    /// The previous target failed validation and stays active.
    Blocked(ValidationError),
}

impl ActivateOutcome {
    /// Whether `target` is now the active cell.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ActivateOutcome::Activated | ActivateOutcome::SwitchedColumn | ActivateOutcome::Unchanged
        )
    }
}

/// Result of committing the active edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommit {
    /// Values were written and the edit closed.
    Closed,
    /// Validation failed; the cell stays active.
    Invalid(ValidationError),
    /// Nothing was active.
    Idle,
}

/// Selection and activation state.
#[derive(Debug, Clone, Default)]
pub struct EditStore {
    mode: EditMode,
    selected: Option<CellPos>,
    actived: Option<CellPos>,
    models: HashMap<ColumnId, CellModel>,
    phase: ActivationPhase,
}

impl EditStore {
    pub fn new(mode: EditMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn selected(&self) -> Option<&CellPos> {
        self.selected.as_ref()
    }

    pub fn actived(&self) -> Option<&CellPos> {
        self.actived.as_ref()
    }

    pub fn phase(&self) -> &ActivationPhase {
        &self.phase
    }

    /// Whether `pos` is the active target under the current mode.
    pub fn is_active_target(&self, pos: &CellPos) -> bool {
        self.actived
            .as_ref()
            .is_some_and(|active| self.mode.same_target(active, pos))
    }

    pub fn is_edit_by_row(&self, row: &RowId) -> bool {
        self.actived.as_ref().is_some_and(|active| &active.row == row)
    }

    /// Whether selecting `pos` would change anything: it must differ from
    /// the current selection and not be the active target.
    pub fn can_select(&self, pos: &CellPos) -> bool {
        self.selected.as_ref() != Some(pos) && !self.is_active_target(pos)
    }

    /// Select `pos`. No-op unless [`can_select`](Self::can_select) holds.
    pub fn select(&mut self, pos: CellPos) -> bool {
        if !self.can_select(&pos) {
            return false;
        }
        self.selected = Some(pos);
        true
    }

    pub fn clear_selected(&mut self) -> Option<CellPos> {
        self.selected.take()
    }

    /// How activating `next` relates to the current target.
    pub fn classify(&self, next: &CellPos) -> Transition {
        let Some(active) = self.actived.as_ref() else {
            return Transition::Fresh;
        };
        if active == next {
            Transition::Same
        } else if self.mode.same_target(active, next) {
            Transition::SwitchColumn {
                previous: active.clone(),
            }
        } else {
            Transition::Replace {
                previous: active.clone(),
            }
        }
    }

    /// Enter [`ActivationPhase::CommitPending`] for a replacement by `next`.
    pub fn begin_commit(&mut self, next: &CellPos) -> bool {
        let Some(previous) = self.actived.clone() else {
            return false;
        };
        self.phase = ActivationPhase::CommitPending {
            previous,
            next: next.clone(),
        };
        true
    }

    /// The previous target is closed; move to [`ActivationPhase::ActivateNext`].
    pub fn enter_activate_next(&mut self, next: &CellPos) {
        self.phase = ActivationPhase::ActivateNext { next: next.clone() };
    }

    /// Make `next` the active target and return to idle.
    ///
    /// `initial` seeds the pending model of the active column from the row.
    /// Models of other columns of the same row are kept in row mode.
    pub fn activate(&mut self, next: CellPos, initial: CellValue) {
        let same_row = self.is_edit_by_row(&next.row);
        if !same_row {
            self.models.clear();
        }
        self.models.entry(next.column).or_insert(CellModel {
            value: initial,
            update: false,
        });
        self.actived = Some(next);
        self.phase = ActivationPhase::Idle;
    }

    /// Give up a pending activation; the current target stays.
    pub fn abort_activation(&mut self) {
        self.phase = ActivationPhase::Idle;
    }

    pub fn model(&self, column: ColumnId) -> Option<&CellModel> {
        self.models.get(&column)
    }

    /// Change the pending value of `column` of the active row.
    pub fn set_model(&mut self, column: ColumnId, value: CellValue) -> bool {
        if self.actived.is_none() {
            return false;
        }
        self.models.insert(column, CellModel { value, update: true });
        true
    }

    /// Pending values that differ from the row, marked as written.
    pub fn take_updates(&mut self) -> Vec<(ColumnId, CellValue)> {
        self.models
            .iter_mut()
            .filter(|(_, model)| model.update)
            .map(|(column, model)| {
                model.update = false;
                (*column, model.value.clone())
            })
            .collect()
    }

    /// Pending value of `column` if it differs from the row, marked as
    /// written.
    pub fn take_update(&mut self, column: ColumnId) -> Option<CellValue> {
        let model = self.models.get_mut(&column).filter(|model| model.update)?;
        model.update = false;
        Some(model.value.clone())
    }

    /// Drop the active target. Pending values are discarded, so callers
    /// write them back first.
    pub fn close(&mut self) -> Option<CellPos> {
        self.models.clear();
        self.phase = ActivationPhase::Idle;
        self.actived.take()
    }

    /// Forget selection that points at a removed row.
    pub fn forget_selected_rows<F>(&mut self, removed: F)
    where
        F: Fn(&RowId) -> bool,
    {
        if self.selected.as_ref().is_some_and(|s| removed(&s.row)) {
            self.selected = None;
        }
    }
}

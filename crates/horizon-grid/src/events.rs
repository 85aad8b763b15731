//! Grid events.
//!
//! Every state transition the host may react to is reported as a
//! [`GridEvent`] through one [`Signal`]. Hosts subscribe with
//! [`Grid::events`](crate::Grid::events):
//!
//! ```ignore
//! grid.events().connect(|event| {
//!     if let GridEvent::EditClosed(cell) = event {
//!         println!("closed {}", cell.row);
//!     }
//! });
//! ```

use std::ops::Range;

use horizon_grid_core::Signal;
use horizon_grid_core::logging::targets;

use crate::model::column::ColumnId;
use crate::model::merge::Axis;
use crate::model::pipeline::{SortOrder, SortSpec};
use crate::model::row_cache::RowId;

/// A cell with its indices in the three coordinate spaces.
///
/// `*_index` is the position in the full data, `vt_*` in the after-data and
/// `vm_*` in the rendered window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEvent {
    pub row: RowId,
    pub column: ColumnId,
    pub row_index: Option<usize>,
    pub vt_row_index: Option<usize>,
    pub vm_row_index: Option<usize>,
    pub column_index: Option<usize>,
    pub vt_column_index: Option<usize>,
    pub vm_column_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    EditActived(CellEvent),
    EditClosed(CellEvent),
    /// The before-edit hook refused an activation.
    EditDisabled(CellEvent),
    CellSelected(CellEvent),
    ToggleRowExpand {
        row: RowId,
        expanded: bool,
    },
    ToggleTreeExpand {
        row: RowId,
        expanded: bool,
    },
    CheckboxChange {
        rows: Vec<RowId>,
        checked: bool,
    },
    SortChange {
        column: Option<ColumnId>,
        order: Option<SortOrder>,
        sorts: Vec<SortSpec>,
    },
    FilterChange {
        column: Option<ColumnId>,
        filtered: Vec<ColumnId>,
    },
    Scroll {
        axis: Axis,
        position: f32,
        window: Range<usize>,
    },
}

impl GridEvent {
    /// Dashed event name.
    pub fn name(&self) -> &'static str {
        match self {
            GridEvent::EditActived(_) => "edit-actived",
            GridEvent::EditClosed(_) => "edit-closed",
            GridEvent::EditDisabled(_) => "edit-disabled",
            GridEvent::CellSelected(_) => "cell-selected",
            GridEvent::ToggleRowExpand { .. } => "toggle-row-expand",
            GridEvent::ToggleTreeExpand { .. } => "toggle-tree-expand",
            GridEvent::CheckboxChange { .. } => "checkbox-change",
            GridEvent::SortChange { .. } => "sort-change",
            GridEvent::FilterChange { .. } => "filter-change",
            GridEvent::Scroll { .. } => "scroll",
        }
    }

    /// The cell payload, for cell events.
    pub fn cell(&self) -> Option<&CellEvent> {
        match self {
            GridEvent::EditActived(cell)
            | GridEvent::EditClosed(cell)
            | GridEvent::EditDisabled(cell)
            | GridEvent::CellSelected(cell) => Some(cell),
            _ => None,
        }
    }
}

/// The single emit path for grid events.
#[derive(Default)]
pub struct EventBus {
    signal: Signal<GridEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> &Signal<GridEvent> {
        &self.signal
    }

    pub fn dispatch(&self, event: GridEvent) {
        tracing::debug!(target: targets::EVENTS, name = event.name(), "dispatch");
        self.signal.emit(event);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("connections", &self.signal.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_names() {
        let event = GridEvent::ToggleTreeExpand {
            row: RowId::from("1"),
            expanded: true,
        };
        assert_eq!(event.name(), "toggle-tree-expand");
        assert!(event.cell().is_none());
        let event = GridEvent::Scroll {
            axis: Axis::Row,
            position: 0.0,
            window: 0..8,
        };
        assert_eq!(event.name(), "scroll");
    }

    #[test]
    fn test_dispatch_reaches_slots() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.signal().connect(move |event: &GridEvent| sink.lock().push(event.name()));
        bus.dispatch(GridEvent::CheckboxChange {
            rows: vec![RowId::from("a")],
            checked: true,
        });
        assert_eq!(*seen.lock(), vec!["checkbox-change"]);
    }
}

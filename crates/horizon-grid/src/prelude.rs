//! Prelude module for Horizon Grid.
//!
//! ```ignore
//! use horizon_grid::prelude::*;
//! ```
//!
//! This provides access to:
//! - The facade and its configuration (`Grid`, `GridConfig`, `GridHooks`)
//! - Records and ids (`Record`, `CellValue`, `RowId`, `ColumnId`)
//! - Columns, sort and filter (`Column`, `SortOrder`, `FilterOption`)
//! - Edit, expand and merge results (`ActivateOutcome`, `ExpandOutcome`, `CellSpan`)

// ============================================================================
// Facade
// ============================================================================

pub use crate::grid::{
    DEFAULT_ROW_HEIGHT, ExpandOutcome, Grid, InsertPosition, Recordset, ScrollInfo, Viewport,
};
pub use crate::hooks::{
    ExpandKind, FocusHook, GridHooks, NoopNotifier, RenderNotifier, ToggleParams, ValidatePhase,
    ValidateTarget, Validator,
};

// ============================================================================
// Configuration and errors
// ============================================================================

pub use crate::config::{
    CheckboxConfig, EditConfig, GridConfig, RowExpandConfig, ScrollConfig, SortConfig,
    SortDefault, TreeConfig,
};
pub use crate::error::{GridError, LoadError, Result, ValidationError};

// ============================================================================
// Records, rows and columns
// ============================================================================

pub use crate::model::column::{ColRef, Column, ColumnId, ColumnKind, FixedSide};
pub use crate::model::row_cache::{RowId, Seq};
pub use crate::record::{CellAccessor, CellValue, PathAccessor, Record, get_path, record_from_value, set_path};

// ============================================================================
// Sort, filter and merge
// ============================================================================

pub use crate::model::merge::{Axis, CellSpan, MergeItem, MergeSpec, RowRef};
pub use crate::model::pipeline::{
    ColumnFilterParams, FilterOption, FilterParams, SortColumn, SortOrder, SortParams, SortSpec, SortType,
};

// ============================================================================
// Edit state and events
// ============================================================================

pub use crate::events::{CellEvent, GridEvent};
pub use crate::view::edit::{
    ActivateOutcome, ActivationPhase, CellGesture, CellPos, EditCommit, EditMode, EditTrigger,
};
pub use horizon_grid_core::{ConnectionType, Signal};

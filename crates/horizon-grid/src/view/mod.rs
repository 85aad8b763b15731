//! Viewport-side state of the grid.
//!
//! - [`window`]: virtual windows for the row and column axes
//! - [`edit`]: selection and edit activation
//! - [`checkbox`]: checkbox row selection
//! - [`row_expand`]: row detail expansion

pub mod checkbox;
pub mod edit;
pub mod row_expand;
pub mod window;

pub use checkbox::CheckboxSelection;
pub use edit::{
    ActivateOutcome, ActivationPhase, CellGesture, CellModel, CellPos, EditCommit, EditMode,
    EditStore, EditTrigger, Transition,
};
pub use row_expand::RowExpandState;
pub use window::{Extents, ScrollDebounce, VirtualAxis, WindowState, compute_visible_size};

//! Data-side structures of the grid.
//!
//! Everything here is independent of the viewport:
//!
//! - [`row_cache`]: row identity and per-row index metadata
//! - [`tree`]: tree topology arena, flattening and expansion state
//! - [`column`]: column arena, visible ordering and column indices
//! - [`pipeline`]: filter and sort producing the after-data
//! - [`merge`]: merged cell spans and window expansion around them
//!
//! # Coordinate spaces
//!
//! ```text
//!  full data ──filter/sort──> after-data ──window──> rendered rows
//!   (index)                  (flat_index)            (view_index)
//! ```

pub mod column;
pub mod merge;
pub mod pipeline;
pub mod row_cache;
pub mod tree;

pub use column::{
    ColRef, Column, ColumnFilterFn, ColumnId, ColumnIndexEntry, ColumnKind, ColumnRegistry,
    FixedSide, SortBy, SortKeyFn,
};
pub use merge::{Axis, CellSpan, MergeItem, MergeList, MergeSpec, RowRef};
pub use pipeline::{
    ColumnFilterParams, FilterOption, FilterParams, GlobalFilterFn, Pipeline, SortColumn, SortKey,
    SortMethodFn, SortOrder, SortParams, SortSpec, SortType,
};
pub use row_cache::{DatasetShape, RowCache, RowId, RowIndexEntry, Seq};
pub use tree::{ExpandPlan, TreeExpandState, TreeLink, TreeNode, TreeStore};

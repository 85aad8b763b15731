//! Horizon Grid - the data-indexing, windowing and edit-state engine of a
//! data grid.
//!
//! The engine turns a flat or tree-shaped set of records into the rows and
//! columns a renderer should draw, and owns the selection and edit state of
//! those cells. It draws nothing itself; hosts feed it data, viewport sizes,
//! scroll positions and pointer gestures, and read back windows, indices
//! and [`GridEvent`]s.
//!
//! ```text
//!  records ─> row cache ─> tree ─> filter/sort ─> after-data ─> Y window ─┐
//!  columns ─> column registry ───────────────────> visible ───> X window ─┤
//!                                     merge spans widen both windows <────┘
//! ```
//!
//! # Example
//!
//! ```
//! use horizon_grid::prelude::*;
//! use serde_json::json;
//!
//! let mut grid = Grid::new(GridConfig::default(), vec![Column::new("name").sortable()]);
//! let records = ["b", "a", "c"]
//!     .into_iter()
//!     .filter_map(|name| record_from_value(json!({ "name": name })))
//!     .collect();
//! grid.load_data(records);
//!
//! grid.sort("name", Some(SortOrder::Asc)).unwrap();
//! let names: Vec<_> = grid
//!     .get_table_records()
//!     .iter()
//!     .map(|r| r["name"].clone())
//!     .collect();
//! assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod hooks;
pub mod model;
pub mod prelude;
pub mod record;
pub mod view;

pub use config::GridConfig;
pub use error::{GridError, LoadError, Result, ValidationError};
pub use events::{CellEvent, GridEvent};
pub use grid::{ExpandOutcome, Grid, InsertPosition, Recordset, ScrollInfo, Viewport};
pub use hooks::GridHooks;
pub use record::{CellValue, Record};

pub use horizon_grid_core::{ConnectionGuard, ConnectionId, ConnectionType, Signal};

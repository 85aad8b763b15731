//! Core systems for Horizon Grid.
//!
//! This crate provides the host-agnostic runtime pieces the grid engine is
//! built on:
//!
//! - **Signals**: typed observer connections with direct or queued delivery
//! - **Tick scheduling**: a two-lane deferred queue modelling "next tick" and
//!   "macrotask" ordering without an event loop
//! - **Logging**: tracing targets, span names and helper macros
//!
//! # Example
//!
//! ```
//! use horizon_grid_core::{Lane, Signal, TickQueue};
//!
//! let changed = Signal::<usize>::new();
//! changed.connect(|rows| println!("{rows} rows"));
//! changed.emit(3);
//!
//! let mut queue = TickQueue::new();
//! queue.post(Lane::Macrotask, "focus");
//! queue.post(Lane::NextTick, "commit");
//! assert_eq!(queue.drain_turn(), vec!["commit", "focus"]);
//! ```

pub mod logging;
pub mod scheduler;
pub mod signal;

pub use logging::PerfSpan;
pub use scheduler::{Lane, TaskId, TickQueue};
pub use signal::{ConnectionGuard, ConnectionId, ConnectionType, Signal};

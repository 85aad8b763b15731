//! Logging facilities for Horizon Grid.
//!
//! This module provides:
//! - Stable `tracing` targets and span names for every grid subsystem
//! - `grid_*!` macros that log under the core target
//! - [`PerfSpan`], a guard for timing heavy recomputations
//!
//! # Tracing Integration
//!
//! Horizon Grid uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber::EnvFilter;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter(EnvFilter::new("horizon_grid::merge=debug"))
//!     .init();
//! ```

/// Span names used throughout Horizon Grid for tracing.
pub mod span_names {
    /// Full dataset load.
    pub const LOAD: &str = "horizon_grid::load";
    /// Filter/sort recomputation.
    pub const PIPELINE: &str = "horizon_grid::pipeline";
    /// Row cache rebuild.
    pub const ROW_CACHE: &str = "horizon_grid::rows";
    /// Settle pass (deferred work + queued slots).
    pub const SETTLE: &str = "horizon_grid::settle";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_grid_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_grid_core::signal";
    /// Tick scheduler target.
    pub const SCHEDULER: &str = "horizon_grid_core::scheduler";
    /// Grid facade.
    pub const GRID: &str = "horizon_grid";
    /// Row identity cache.
    pub const ROWS: &str = "horizon_grid::rows";
    /// Column registry.
    pub const COLUMNS: &str = "horizon_grid::columns";
    /// Tree transformer and expansion.
    pub const TREE: &str = "horizon_grid::tree";
    /// Filter/sort pipeline.
    pub const PIPELINE: &str = "horizon_grid::pipeline";
    /// Merge-span resolver.
    pub const MERGE: &str = "horizon_grid::merge";
    /// Virtual window engine.
    pub const SCROLL: &str = "horizon_grid::scroll";
    /// Edit/selection state machine.
    pub const EDIT: &str = "horizon_grid::edit";
    /// Event dispatch.
    pub const EVENTS: &str = "horizon_grid::events";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_grid::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Macros for common tracing patterns.
///
/// These are thin wrappers around the `tracing` crate macros with consistent
/// target naming.
#[macro_export]
macro_rules! grid_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_grid_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! grid_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_grid_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! grid_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "horizon_grid_core", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [
            targets::ROWS,
            targets::COLUMNS,
            targets::TREE,
            targets::PIPELINE,
            targets::MERGE,
            targets::SCROLL,
            targets::EDIT,
            targets::EVENTS,
        ] {
            assert!(target.starts_with(targets::GRID));
        }
    }

    #[test]
    fn test_macros_with_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("horizon_grid_core=trace"))
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            crate::grid_trace!(value = 1, "trace");
            crate::grid_debug!("debug");
            crate::grid_warn!("warn");
        });
    }
}

//! Virtual window engine.
//!
//! One [`VirtualAxis`] per scroll direction decides which slice
//! `[start, end)` of the axis is materialized. Rows use a uniform item
//! extent; columns use per-item widths through prefix sums.
//!
//! Windowing only activates when the axis holds more items than the
//! configured threshold. Below it the whole axis is the window.
//!
//! On scroll the axis derives the target index from the position and builds
//! a candidate window around it, expanded so that no merged span is cut.
//! The candidate is committed only when the target left the inner margin of
//! the committed window and the candidate actually differs:
//!
//! ```text
//!  start         end - visible - 1        end
//!    |<-- inner margin: no recompute -->|    |
//! ```

use std::ops::Range;
use std::time::{Duration, Instant};

use horizon_grid_core::logging::targets;

use crate::config::ScrollConfig;
use crate::model::merge::{Axis, MergeList};

/// Smallest visible size ever reported, so the first paint is not starved.
pub const MIN_VISIBLE_SIZE: usize = 8;

/// Extra items rendered past a uniform viewport.
const VISIBLE_MARGIN: usize = 2;

/// Committed window state of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub start: usize,
    pub end: usize,
    pub visible_size: usize,
    pub offset_size: usize,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            visible_size: MIN_VISIBLE_SIZE,
            offset_size: 0,
        }
    }
}

/// Item sizes along an axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Extents {
    /// Every item has the same size (rows).
    Uniform(f32),
    /// Running totals: `prefix[i]` is the start offset of item `i`, and the
    /// last element is the total size (columns).
    Variable(Vec<f32>),
}

impl Extents {
    /// Build running totals from per-item sizes.
    pub fn from_sizes(sizes: &[f32]) -> Self {
        let mut prefix = Vec::with_capacity(sizes.len() + 1);
        let mut total = 0.0;
        prefix.push(total);
        for size in sizes {
            total += size.max(0.0);
            prefix.push(total);
        }
        Self::Variable(prefix)
    }
}

/// Number of items to render for a viewport of `viewport` pixels with items
/// of `item_extent` pixels.
pub fn compute_visible_size(viewport: f32, item_extent: f32) -> usize {
    if viewport <= 0.0 || item_extent <= 0.0 {
        return MIN_VISIBLE_SIZE;
    }
    let fit = (viewport / item_extent).ceil() as usize;
    (fit + VISIBLE_MARGIN).max(MIN_VISIBLE_SIZE)
}

/// Windowing state and algorithm for one axis.
#[derive(Debug, Clone)]
pub struct VirtualAxis {
    axis: Axis,
    config: ScrollConfig,
    state: WindowState,
    extents: Extents,
    len: usize,
    active: bool,
    viewport: f32,
    position: f32,
}

impl VirtualAxis {
    pub fn new(axis: Axis, config: ScrollConfig) -> Self {
        let state = WindowState {
            offset_size: config.o_size,
            ..WindowState::default()
        };
        Self {
            axis,
            config,
            state,
            extents: Extents::Uniform(0.0),
            len: 0,
            active: false,
            viewport: 0.0,
            position: 0.0,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether windowing is in effect.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last scroll position seen.
    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn viewport(&self) -> f32 {
        self.viewport
    }

    pub fn set_uniform_extent(&mut self, extent: f32) {
        self.extents = Extents::Uniform(extent.max(0.0));
    }

    /// Per-item sizes. The axis length follows the number of sizes.
    pub fn set_extents(&mut self, sizes: &[f32]) {
        self.extents = Extents::from_sizes(sizes);
    }

    pub fn extents(&self) -> &Extents {
        &self.extents
    }

    /// Re-evaluate whether windowing applies for an axis of `len` items.
    ///
    /// `allowed` lets the owner veto windowing (e.g. grouped headers).
    /// Switching between windowed and plain resets the window to `[0, 1)`
    /// before anything is recomputed. Returns whether activeness changed.
    pub fn update_status(&mut self, len: usize, allowed: bool) -> bool {
        let active = allowed && self.config.enabled && len > self.config.gt;
        let changed = active != self.active;
        if changed {
            self.state.start = 0;
            self.state.end = 1;
            tracing::debug!(
                target: targets::SCROLL,
                axis = ?self.axis,
                len,
                active,
                "windowing toggled"
            );
        }
        self.len = len;
        self.active = active;
        if self.state.start >= len {
            self.state.start = 0;
        }
        changed
    }

    /// Start offset of item `index`.
    pub fn offset_of(&self, index: usize) -> f32 {
        match &self.extents {
            Extents::Uniform(extent) => index as f32 * extent,
            Extents::Variable(prefix) => {
                let last = prefix.len().saturating_sub(1);
                prefix.get(index.min(last)).copied().unwrap_or(0.0)
            }
        }
    }

    /// Size of the whole axis in pixels.
    pub fn total_extent(&self) -> f32 {
        self.offset_of(self.len)
    }

    /// Index of the item at `position`.
    pub fn index_at(&self, position: f32) -> usize {
        let position = position.max(0.0);
        let index = match &self.extents {
            Extents::Uniform(extent) if *extent > 0.0 => (position / extent).floor() as usize,
            Extents::Uniform(_) => 0,
            Extents::Variable(prefix) => {
                // First item whose end lies past the position.
                let ends = prefix.get(1..).unwrap_or(&[]);
                let found = ends.partition_point(|end| *end <= position);
                found.min(ends.len().saturating_sub(1))
            }
        };
        index.min(self.len.saturating_sub(1))
    }

    /// Visible size for a viewport whose first item is `target`.
    fn visible_size_from(&self, target: usize) -> usize {
        match &self.extents {
            Extents::Uniform(extent) => compute_visible_size(self.viewport, *extent),
            Extents::Variable(prefix) => {
                let limit = self.offset_of(target) + self.viewport;
                let mut count = 0;
                for i in target..self.len {
                    count += 1;
                    if prefix.get(i + 1).copied().unwrap_or(f32::MAX) > limit {
                        break;
                    }
                }
                count.max(MIN_VISIBLE_SIZE)
            }
        }
    }

    /// Re-derive visible and offset sizes for a viewport of `viewport`
    /// pixels and make sure the window covers them.
    pub fn layout(&mut self, viewport: f32) -> Range<usize> {
        self.viewport = viewport.max(0.0);
        let target = self.index_at(self.position);
        self.state.visible_size = self.visible_size_from(target);
        self.state.offset_size = self.config.o_size;
        if self.active {
            let wanted = self.state.start + self.state.visible_size + self.state.offset_size;
            self.state.end = wanted.max(self.state.end);
        }
        self.window()
    }

    /// Feed a scroll position. Returns true when a new window was committed.
    pub fn on_scroll(&mut self, position: f32, merges: &MergeList) -> bool {
        self.position = position.max(0.0);
        if !self.active {
            return false;
        }
        let target = self.index_at(self.position);
        if matches!(self.extents, Extents::Variable(_)) {
            self.state.visible_size = self.visible_size_from(target);
        }
        let WindowState {
            start,
            end,
            visible_size,
            offset_size,
        } = self.state;

        let candidate_start = target.saturating_sub(1 + offset_size);
        let candidate_end = (target + visible_size + offset_size).min(self.len);
        let candidate = merges.expand_window(candidate_start..candidate_end, self.axis);
        let candidate = candidate.start..candidate.end.min(self.len);

        let outside_margin = target <= start || target + visible_size + 1 >= end;
        if outside_margin && candidate != (start..end) {
            tracing::trace!(
                target: targets::SCROLL,
                axis = ?self.axis,
                target,
                window = ?candidate,
                "window committed"
            );
            self.state.start = candidate.start;
            self.state.end = candidate.end;
            return true;
        }
        false
    }

    /// Grow the committed window so that it cuts no span. Returns true when
    /// the window changed.
    pub fn fit_spans(&mut self, merges: &MergeList) -> bool {
        if !self.active {
            return false;
        }
        let current = self.window();
        let expanded = merges.expand_window(current.clone(), self.axis);
        let expanded = expanded.start..expanded.end.min(self.len);
        if expanded == current {
            return false;
        }
        self.state.start = expanded.start;
        self.state.end = expanded.end;
        true
    }

    /// The materialized slice of the axis.
    pub fn window(&self) -> Range<usize> {
        if !self.active {
            return 0..self.len;
        }
        let end = self.state.end.min(self.len);
        self.state.start.min(end)..end
    }

    /// Back to the top. The window restarts at zero.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.state.start = 0;
        if self.active {
            self.state.end = self.state.visible_size + self.state.offset_size;
        }
    }

    /// Follow a length change of the axis without re-evaluating whether
    /// windowing applies. A window left past the new end is pulled back.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.active && self.state.start >= len {
            let span = self.state.visible_size + self.state.offset_size;
            self.state.start = len.saturating_sub(span);
            self.state.end = self.state.start + span;
        }
    }
}

/// Trailing-edge debounce for scroll positions.
///
/// Each [`schedule`](Self::schedule) pushes the deadline back; only the last
/// position survives and is released once the delay elapsed without new
/// input.
#[derive(Debug, Clone)]
pub struct ScrollDebounce {
    delay: Duration,
    pending: Option<(f32, Instant)>,
}

impl ScrollDebounce {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(20);

    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, position: f32, now: Instant) {
        self.pending = Some((position, now + self.delay));
    }

    /// The pending position, if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<f32> {
        match self.pending {
            Some((position, deadline)) if deadline <= now => {
                self.pending = None;
                Some(position)
            }
            _ => None,
        }
    }

    /// The pending position, regardless of the deadline.
    pub fn flush(&mut self) -> Option<f32> {
        self.pending.take().map(|(position, _)| position)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

impl Default for ScrollDebounce {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::column::ColumnId;
    use crate::model::merge::MergeItem;
    use crate::model::row_cache::RowId;

    fn rows_axis(len: usize) -> VirtualAxis {
        let mut axis = VirtualAxis::new(Axis::Row, ScrollConfig::threshold(20));
        axis.set_uniform_extent(10.0);
        axis.update_status(len, true);
        axis.layout(100.0);
        axis
    }

    #[test]
    fn test_compute_visible_size() {
        assert_eq!(compute_visible_size(100.0, 10.0), 12);
        assert_eq!(compute_visible_size(20.0, 10.0), MIN_VISIBLE_SIZE);
        assert_eq!(compute_visible_size(0.0, 10.0), MIN_VISIBLE_SIZE);
        assert_eq!(compute_visible_size(105.0, 10.0), 13);
    }

    #[test]
    fn test_inactive_below_threshold() {
        let axis = rows_axis(15);
        assert!(!axis.is_active());
        assert_eq!(axis.window(), 0..15);
    }

    #[test]
    fn test_layout_opens_window() {
        let axis = rows_axis(500);
        assert!(axis.is_active());
        assert_eq!(axis.state().visible_size, 12);
        assert_eq!(axis.window(), 0..12);
    }

    #[test]
    fn test_scroll_hysteresis() {
        let mut axis = rows_axis(500);
        let merges = MergeList::new();

        // Inside the inner margin: nothing to do.
        assert!(!axis.on_scroll(0.0, &merges));
        assert!(!axis.on_scroll(-5.0, &merges));

        // Target 100 is far outside the committed window.
        assert!(axis.on_scroll(1000.0, &merges));
        assert_eq!(axis.window(), 99..112);

        // Same position again: candidate unchanged.
        assert!(!axis.on_scroll(1005.0, &merges));
        assert_eq!(axis.window(), 99..112);
    }

    #[test]
    fn test_scroll_clamps_to_len() {
        let mut axis = rows_axis(50);
        assert!(axis.on_scroll(490.0, &MergeList::new()));
        let window = axis.window();
        assert_eq!(window.end, 50);
        assert_eq!(window.start, 48);
    }

    #[test]
    fn test_scroll_expands_around_spans() {
        let mut axis = rows_axis(500);
        let mut merges = MergeList::new();
        let mut ids: slotmap::SlotMap<ColumnId, ()> = slotmap::SlotMap::with_key();
        merges
            .add(MergeItem {
                row: 95,
                col: 0,
                rowspan: 6,
                colspan: 1,
                row_anchor: RowId::from("r95"),
                col_anchor: ids.insert(()),
            })
            .unwrap();
        assert!(axis.on_scroll(1000.0, &merges));
        assert_eq!(axis.window(), 95..112);
    }

    #[test]
    fn test_toggle_resets_window() {
        let mut axis = rows_axis(500);
        axis.on_scroll(1000.0, &MergeList::new());
        assert!(axis.update_status(10, true));
        assert_eq!(axis.state().start, 0);
        assert_eq!(axis.state().end, 1);
        assert_eq!(axis.window(), 0..10);

        assert!(axis.update_status(500, true));
        assert_eq!(axis.state().end, 1);
        axis.layout(100.0);
        assert_eq!(axis.window(), 0..12);
    }

    #[test]
    fn test_variable_extents() {
        let mut axis = VirtualAxis::new(Axis::Column, ScrollConfig::threshold(2));
        let widths = vec![50.0; 40];
        axis.set_extents(&widths);
        axis.update_status(widths.len(), true);
        axis.layout(120.0);
        assert_eq!(axis.index_at(0.0), 0);
        assert_eq!(axis.index_at(49.0), 0);
        assert_eq!(axis.index_at(50.0), 1);
        assert_eq!(axis.offset_of(3), 150.0);
        assert_eq!(axis.total_extent(), 2000.0);
        assert_eq!(axis.window(), 0..8);

        assert!(axis.on_scroll(1000.0, &MergeList::new()));
        assert_eq!(axis.window(), 19..28);

        // Past the last column the window stays at the end of the axis.
        assert_eq!(axis.index_at(5000.0), 39);
        axis.on_scroll(5000.0, &MergeList::new());
        assert_eq!(axis.window().end, 40);
        assert!(axis.window().contains(&39));
    }

    #[test]
    fn test_set_len_pulls_window_back() {
        let mut axis = rows_axis(500);
        axis.on_scroll(1000.0, &MergeList::new());
        axis.set_len(30);
        assert_eq!(axis.window(), 18..30);
        axis.set_len(500);
        assert_eq!(axis.window(), 18..30);
    }

    #[test]
    fn test_disabled_never_activates() {
        let mut axis = VirtualAxis::new(Axis::Row, ScrollConfig::disabled());
        axis.update_status(10_000, true);
        assert!(!axis.is_active());
        let mut axis = VirtualAxis::new(Axis::Row, ScrollConfig::threshold(5));
        axis.update_status(10, false);
        assert!(!axis.is_active());
    }

    #[test]
    fn test_debounce_trailing() {
        let start = Instant::now();
        let mut debounce = ScrollDebounce::default();
        debounce.schedule(10.0, start);
        debounce.schedule(30.0, start + Duration::from_millis(10));
        assert_eq!(debounce.poll(start + Duration::from_millis(25)), None);
        assert_eq!(debounce.poll(start + Duration::from_millis(30)), Some(30.0));
        assert!(!debounce.is_pending());

        debounce.schedule(5.0, start);
        assert_eq!(debounce.flush(), Some(5.0));
        assert_eq!(debounce.flush(), None);
    }
}

//! Row detail expansion.
//!
//! Works like tree expansion, without topology: any row can expand, and in
//! accordion mode at most one row is expanded at a time.

use std::collections::HashSet;

use crate::model::row_cache::RowId;
use crate::model::tree::ExpandPlan;

#[derive(Debug, Clone, Default)]
pub struct RowExpandState {
    expanded: HashSet<RowId>,
    loading: HashSet<RowId>,
}

impl RowExpandState {
    pub fn is_expanded(&self, rowid: &RowId) -> bool {
        self.expanded.contains(rowid)
    }

    pub fn is_loading(&self, rowid: &RowId) -> bool {
        self.loading.contains(rowid)
    }

    /// Expanded rows in the order of `order`.
    pub fn expanded_in(&self, order: &[RowId]) -> Vec<RowId> {
        order.iter().filter(|id| self.expanded.contains(*id)).cloned().collect()
    }

    /// Expand or collapse `rows`. See [`TreeExpandState::set_expanded`] for
    /// the meaning of `needs_load` and the returned plan.
    ///
    /// [`TreeExpandState::set_expanded`]: crate::model::tree::TreeExpandState::set_expanded
    pub fn set_expanded<F>(
        &mut self,
        rows: &[RowId],
        expanded: bool,
        accordion: bool,
        mut needs_load: F,
    ) -> ExpandPlan
    where
        F: FnMut(&RowId) -> bool,
    {
        let mut plan = ExpandPlan::default();
        let targets: &[RowId] = if accordion && expanded {
            rows.last().map(std::slice::from_ref).unwrap_or(&[])
        } else {
            rows
        };
        for rowid in targets {
            if expanded {
                if accordion {
                    let others: Vec<RowId> =
                        self.expanded.iter().filter(|id| *id != rowid).cloned().collect();
                    for other in others {
                        self.expanded.remove(&other);
                        plan.collapsed.push(other);
                    }
                }
                if self.expanded.contains(rowid) {
                    continue;
                }
                if self.loading.contains(rowid) {
                    plan.already_loading.push(rowid.clone());
                } else if needs_load(rowid) {
                    self.loading.insert(rowid.clone());
                    plan.load.push(rowid.clone());
                } else {
                    self.expanded.insert(rowid.clone());
                    plan.expanded.push(rowid.clone());
                }
            } else if self.expanded.remove(rowid) {
                plan.collapsed.push(rowid.clone());
            }
        }
        plan
    }

    /// Settle a lazy load; the row expands on success.
    pub fn finish_load(&mut self, rowid: &RowId, success: bool) -> bool {
        self.loading.remove(rowid);
        success && self.expanded.insert(rowid.clone())
    }

    pub fn collapse(&mut self, rowid: &RowId) -> bool {
        self.expanded.remove(rowid)
    }

    pub fn clear(&mut self) -> Vec<RowId> {
        self.expanded.drain().collect()
    }

    pub fn retain_known<F>(&mut self, mut exists: F)
    where
        F: FnMut(&RowId) -> bool,
    {
        self.expanded.retain(|id| exists(id));
        self.loading.retain(|id| exists(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<RowId> {
        values.iter().map(|v| RowId::from(*v)).collect()
    }

    #[test]
    fn test_expand_and_collapse() {
        let mut state = RowExpandState::default();
        let plan = state.set_expanded(&ids(&["a", "b"]), true, false, |_| false);
        assert_eq!(plan.expanded, ids(&["a", "b"]));
        assert_eq!(state.expanded_in(&ids(&["b", "c", "a"])), ids(&["b", "a"]));
        let plan = state.set_expanded(&ids(&["a"]), false, false, |_| false);
        assert_eq!(plan.collapsed, ids(&["a"]));
    }

    #[test]
    fn test_accordion_keeps_one() {
        let mut state = RowExpandState::default();
        state.set_expanded(&ids(&["a"]), true, true, |_| false);
        let plan = state.set_expanded(&ids(&["b", "c"]), true, true, |_| false);
        assert_eq!(plan.collapsed, ids(&["a"]));
        assert_eq!(plan.expanded, ids(&["c"]));
        assert!(!state.is_expanded(&RowId::from("b")));
    }

    #[test]
    fn test_lazy_load_lifecycle() {
        let mut state = RowExpandState::default();
        let plan = state.set_expanded(&ids(&["a"]), true, false, |_| true);
        assert_eq!(plan.load, ids(&["a"]));
        assert!(state.is_loading(&RowId::from("a")));

        let again = state.set_expanded(&ids(&["a"]), true, false, |_| true);
        assert_eq!(again.already_loading, ids(&["a"]));
        assert!(again.load.is_empty());

        assert!(!state.finish_load(&RowId::from("a"), false));
        assert!(!state.is_expanded(&RowId::from("a")));
        assert!(!state.is_loading(&RowId::from("a")));

        state.set_expanded(&ids(&["a"]), true, false, |_| true);
        assert!(state.finish_load(&RowId::from("a"), true));
        assert!(state.is_expanded(&RowId::from("a")));
    }
}

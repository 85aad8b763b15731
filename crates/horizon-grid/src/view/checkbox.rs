//! Checkbox row selection.
//!
//! In tree data, checking a node checks its whole subtree and re-derives the
//! state of its ancestors: an ancestor is checked when every child is
//! checked, and indeterminate when only some are. `check_strictly` turns the
//! cascade off so every row is independent.

use std::collections::HashSet;

use crate::model::row_cache::RowId;
use crate::model::tree::TreeStore;

#[derive(Debug, Clone, Default)]
pub struct CheckboxSelection {
    checked: HashSet<RowId>,
    indeterminate: HashSet<RowId>,
}

impl CheckboxSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_checked(&self, rowid: &RowId) -> bool {
        self.checked.contains(rowid)
    }

    pub fn is_indeterminate(&self, rowid: &RowId) -> bool {
        self.indeterminate.contains(rowid)
    }

    pub fn len(&self) -> usize {
        self.checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked.is_empty()
    }

    /// Checked rows in the order of `order`.
    pub fn checked_in(&self, order: &[RowId]) -> Vec<RowId> {
        order.iter().filter(|id| self.checked.contains(*id)).cloned().collect()
    }

    /// Check or uncheck `rows`. Returns every row whose checked state
    /// changed, including cascaded descendants and ancestors.
    pub fn set_checked(
        &mut self,
        tree: Option<&TreeStore>,
        rows: &[RowId],
        checked: bool,
        strictly: bool,
    ) -> Vec<RowId> {
        let mut changed = Vec::new();
        for rowid in rows {
            let cascade = match tree {
                Some(tree) if !strictly && tree.contains(rowid) => tree.subtree(rowid),
                _ => vec![rowid.clone()],
            };
            for id in cascade {
                if self.apply(&id, checked) {
                    changed.push(id);
                }
            }
            if let (Some(tree), false) = (tree, strictly) {
                self.refresh_ancestors(tree, rowid, &mut changed);
            }
        }
        changed
    }

    fn apply(&mut self, rowid: &RowId, checked: bool) -> bool {
        self.indeterminate.remove(rowid);
        if checked {
            self.checked.insert(rowid.clone())
        } else {
            self.checked.remove(rowid)
        }
    }

    fn refresh_ancestors(&mut self, tree: &TreeStore, rowid: &RowId, changed: &mut Vec<RowId>) {
        for ancestor in tree.ancestors(rowid) {
            let children = tree.children(&ancestor);
            let all = children.iter().all(|c| self.checked.contains(c));
            let some = children
                .iter()
                .any(|c| self.checked.contains(c) || self.indeterminate.contains(c));
            let flipped = if all {
                self.indeterminate.remove(&ancestor);
                self.checked.insert(ancestor.clone())
            } else {
                if some {
                    self.indeterminate.insert(ancestor.clone());
                } else {
                    self.indeterminate.remove(&ancestor);
                }
                self.checked.remove(&ancestor)
            };
            if flipped {
                changed.push(ancestor);
            }
        }
    }

    /// Check or uncheck every row in `rows`.
    pub fn set_all(&mut self, rows: &[RowId], checked: bool) {
        self.indeterminate.clear();
        if checked {
            self.checked.extend(rows.iter().cloned());
        } else {
            for id in rows {
                self.checked.remove(id);
            }
        }
    }

    pub fn clear(&mut self) -> Vec<RowId> {
        self.indeterminate.clear();
        self.checked.drain().collect()
    }

    /// Drop rows that no longer exist.
    pub fn retain_known<F>(&mut self, mut exists: F)
    where
        F: FnMut(&RowId) -> bool,
    {
        self.checked.retain(|id| exists(id));
        self.indeterminate.retain(|id| exists(id));
    }

    /// Whether every row of `rows` is checked (false for an empty list).
    pub fn all_checked(&self, rows: &[RowId]) -> bool {
        !rows.is_empty() && rows.iter().all(|id| self.checked.contains(id))
    }
}

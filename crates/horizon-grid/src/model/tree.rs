//! Tree topology, flattening and expansion state.
//!
//! Tree rows are kept in an arena ([`TreeStore`]) keyed by [`RowId`]. Each
//! node stores its parent id and ordered children instead of references to
//! other nodes. The same type describes both the full tree and the
//! filtered/sorted "after" tree.
//!
//! Two input shapes are supported:
//!
//! - **nested**: children are embedded in each record under a children field
//!   ([`TreeStore::from_nested`])
//! - **transform**: flat records are linked by matching a parent key against
//!   row keys ([`TreeStore::from_parent_keys`])
//!
//! # Example
//!
//! ```ignore
//! let tree = TreeStore::from_parent_keys(&links, UnresolvedParent::Warn);
//! let mut state = TreeExpandState::default();
//! state.set_expanded(&tree, &[root.clone()], true, false, |_| false);
//! let visible = tree.flatten_visible(state.expanded());
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use horizon_grid_core::logging::targets;

use crate::config::UnresolvedParent;
use crate::model::row_cache::RowId;
use crate::record::Record;

/// One node of the arena.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    pub parent: Option<RowId>,
    pub children: Vec<RowId>,
}

/// Row id plus the key values used to link it in transform mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLink {
    pub rowid: RowId,
    pub key: Option<String>,
    pub parent_key: Option<String>,
}

/// Arena-backed tree topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStore {
    roots: Vec<RowId>,
    nodes: HashMap<RowId, TreeNode>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat store: every row is a childless root.
    pub fn from_roots(roots: Vec<RowId>) -> Self {
        let nodes = roots
            .iter()
            .map(|id| (id.clone(), TreeNode::default()))
            .collect();
        Self { roots, nodes }
    }

    /// Link flat rows by key.
    ///
    /// A row whose parent key does not resolve, resolves to itself, or would
    /// close a cycle becomes a root; each case is logged according to
    /// `unresolved`. Input order is preserved within every sibling group.
    pub fn from_parent_keys(links: &[TreeLink], unresolved: UnresolvedParent) -> Self {
        let by_key: HashMap<&str, &RowId> = links
            .iter()
            .filter_map(|link| link.key.as_deref().map(|key| (key, &link.rowid)))
            .collect();

        let mut parent_of: HashMap<&RowId, &RowId> = HashMap::new();
        for link in links {
            let Some(parent_key) = link.parent_key.as_deref() else {
                continue;
            };
            match by_key.get(parent_key) {
                Some(&parent) if parent != &link.rowid => {
                    parent_of.insert(&link.rowid, parent);
                }
                _ => report_unresolved(unresolved, &link.rowid, parent_key),
            }
        }

        // Break cycles by promoting the first node found on each one.
        for link in links {
            let mut seen = HashSet::new();
            let mut current = &link.rowid;
            while let Some(&parent) = parent_of.get(current) {
                if parent == &link.rowid || !seen.insert(parent) {
                    if parent == &link.rowid {
                        tracing::warn!(
                            target: targets::TREE,
                            rowid = %link.rowid,
                            "parent chain forms a cycle; row promoted to root"
                        );
                        parent_of.remove(&link.rowid);
                    }
                    break;
                }
                current = parent;
            }
        }

        let mut store = Self::new();
        for link in links {
            store.nodes.entry(link.rowid.clone()).or_default();
        }
        for link in links {
            match parent_of.get(&link.rowid) {
                Some(&parent) => {
                    if let Some(node) = store.nodes.get_mut(&link.rowid) {
                        node.parent = Some(parent.clone());
                    }
                    if let Some(node) = store.nodes.get_mut(parent) {
                        node.children.push(link.rowid.clone());
                    }
                }
                None => store.roots.push(link.rowid.clone()),
            }
        }
        store
    }

    /// Split nested records into topology and flat `(id, record)` pairs.
    ///
    /// The children arrays are removed from the records; `assign` gives each
    /// record its identity. Non-object children are dropped.
    pub fn from_nested<F>(
        records: Vec<Record>,
        children_field: &str,
        mut assign: F,
    ) -> (Self, Vec<(RowId, Record)>)
    where
        F: FnMut(&mut Record) -> RowId,
    {
        let mut store = Self::new();
        let mut flat = Vec::new();
        let mut roots = Vec::with_capacity(records.len());
        for record in records {
            roots.push(store.absorb_nested(record, None, children_field, &mut assign, &mut flat));
        }
        store.roots = roots;
        (store, flat)
    }

    fn absorb_nested<F>(
        &mut self,
        mut record: Record,
        parent: Option<&RowId>,
        children_field: &str,
        assign: &mut F,
        flat: &mut Vec<(RowId, Record)>,
    ) -> RowId
    where
        F: FnMut(&mut Record) -> RowId,
    {
        let children = match record.remove(children_field) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let rowid = assign(&mut record);
        flat.push((rowid.clone(), record));

        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            if let Value::Object(child) = child {
                child_ids.push(self.absorb_nested(child, Some(&rowid), children_field, assign, flat));
            }
        }
        self.nodes.insert(
            rowid.clone(),
            TreeNode {
                parent: parent.cloned(),
                children: child_ids,
            },
        );
        rowid
    }

    pub fn roots(&self) -> &[RowId] {
        &self.roots
    }

    pub fn contains(&self, rowid: &RowId) -> bool {
        self.nodes.contains_key(rowid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, rowid: &RowId) -> Option<&TreeNode> {
        self.nodes.get(rowid)
    }

    pub fn children(&self, rowid: &RowId) -> &[RowId] {
        self.nodes
            .get(rowid)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_children(&self, rowid: &RowId) -> bool {
        !self.children(rowid).is_empty()
    }

    pub fn parent(&self, rowid: &RowId) -> Option<&RowId> {
        self.nodes.get(rowid).and_then(|n| n.parent.as_ref())
    }

    /// The sibling group `rowid` belongs to (the roots for a root node).
    pub fn siblings(&self, rowid: &RowId) -> &[RowId] {
        match self.parent(rowid) {
            Some(parent) => self.children(parent),
            None => &self.roots,
        }
    }

    /// Ancestors of `rowid`, nearest first.
    pub fn ancestors(&self, rowid: &RowId) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut current = self.parent(rowid);
        while let Some(parent) = current {
            out.push(parent.clone());
            current = self.parent(parent);
        }
        out
    }

    /// Depth of `rowid`, 0 for roots.
    pub fn level(&self, rowid: &RowId) -> Option<usize> {
        self.contains(rowid).then(|| self.ancestors(rowid).len())
    }

    /// Zero-based sibling positions from the root down to `rowid`.
    pub fn path(&self, rowid: &RowId) -> Option<Vec<usize>> {
        if !self.contains(rowid) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = rowid.clone();
        loop {
            let siblings = self.siblings(&current);
            path.push(siblings.iter().position(|id| id == &current)?);
            match self.parent(&current) {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
        path.reverse();
        Some(path)
    }

    /// Depth-first, pre-order walk. The callback receives the node, its
    /// zero-based path and its parent.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&RowId, &[usize], Option<&RowId>),
    {
        let mut path = Vec::new();
        for (i, root) in self.roots.iter().enumerate() {
            path.push(i);
            self.walk_node(root, None, &mut path, &mut visit);
            path.pop();
        }
    }

    fn walk_node<F>(&self, rowid: &RowId, parent: Option<&RowId>, path: &mut Vec<usize>, visit: &mut F)
    where
        F: FnMut(&RowId, &[usize], Option<&RowId>),
    {
        visit(rowid, path, parent);
        for (i, child) in self.children(rowid).iter().enumerate() {
            path.push(i);
            self.walk_node(child, Some(rowid), path, visit);
            path.pop();
        }
    }

    /// Every node in depth-first order.
    pub fn flatten_all(&self) -> Vec<RowId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(|rowid, _, _| out.push(rowid.clone()));
        out
    }

    /// Depth-first order, descending only into expanded nodes. A node is
    /// emitted only when its whole ancestor chain is expanded.
    pub fn flatten_visible(&self, expanded: &HashSet<RowId>) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut stack: Vec<&RowId> = self.roots.iter().rev().collect();
        while let Some(rowid) = stack.pop() {
            out.push(rowid.clone());
            if expanded.contains(rowid) {
                stack.extend(self.children(rowid).iter().rev());
            }
        }
        out
    }

    /// `rowid` and all of its descendants, depth-first.
    pub fn subtree(&self, rowid: &RowId) -> Vec<RowId> {
        if !self.contains(rowid) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![rowid];
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Insert a new root at `index` (appended when `None` or out of range).
    pub fn insert_root(&mut self, index: Option<usize>, rowid: RowId) {
        let at = index.unwrap_or(self.roots.len()).min(self.roots.len());
        self.roots.insert(at, rowid.clone());
        self.nodes.insert(rowid, TreeNode::default());
    }

    /// Insert a new child of `parent`. Returns `false` if the parent is unknown.
    pub fn insert_child(&mut self, parent: &RowId, index: Option<usize>, rowid: RowId) -> bool {
        let Some(node) = self.nodes.get_mut(parent) else {
            return false;
        };
        let at = index.unwrap_or(node.children.len()).min(node.children.len());
        node.children.insert(at, rowid.clone());
        self.nodes.insert(
            rowid,
            TreeNode {
                parent: Some(parent.clone()),
                children: Vec::new(),
            },
        );
        true
    }

    /// Insert a new node right before `anchor`, as its sibling.
    pub fn insert_before(&mut self, anchor: &RowId, rowid: RowId) -> bool {
        if !self.contains(anchor) {
            return false;
        }
        match self.parent(anchor).cloned() {
            Some(parent) => {
                let at = self.children(&parent).iter().position(|id| id == anchor);
                self.insert_child(&parent, at, rowid)
            }
            None => {
                let at = self.roots.iter().position(|id| id == anchor);
                self.insert_root(at, rowid);
                true
            }
        }
    }

    /// Replace the children of `parent`, dropping any previous subtrees.
    ///
    /// Returns the ids of the dropped descendants.
    pub fn replace_children(&mut self, parent: &RowId, children: Vec<RowId>) -> Vec<RowId> {
        let mut dropped = Vec::new();
        for child in self.children(parent).to_vec() {
            dropped.extend(self.remove_subtree(&child));
        }
        for child in &children {
            self.nodes.insert(
                child.clone(),
                TreeNode {
                    parent: Some(parent.clone()),
                    children: Vec::new(),
                },
            );
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children = children;
        }
        dropped
    }

    /// Detach and forget `rowid` with its descendants.
    pub fn remove_subtree(&mut self, rowid: &RowId) -> Vec<RowId> {
        let removed = self.subtree(rowid);
        if removed.is_empty() {
            return removed;
        }
        match self.parent(rowid).cloned() {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    node.children.retain(|id| id != rowid);
                }
            }
            None => self.roots.retain(|id| id != rowid),
        }
        for id in &removed {
            self.nodes.remove(id);
        }
        removed
    }

    /// Copy of the topology keeping only nodes for which `keep` holds.
    ///
    /// Children of a dropped node are dropped too.
    pub fn retain_copy<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&RowId) -> bool,
    {
        let mut out = Self::new();
        let mut stack: Vec<(&RowId, Option<&RowId>)> =
            self.roots.iter().rev().map(|id| (id, None)).collect();
        let mut order = Vec::new();
        while let Some((rowid, parent)) = stack.pop() {
            if !keep(rowid) {
                continue;
            }
            order.push((rowid, parent));
            stack.extend(self.children(rowid).iter().rev().map(|c| (c, Some(rowid))));
        }
        for (rowid, parent) in order {
            out.nodes.insert(
                rowid.clone(),
                TreeNode {
                    parent: parent.cloned(),
                    children: Vec::new(),
                },
            );
            match parent {
                Some(parent) => {
                    if let Some(node) = out.nodes.get_mut(parent) {
                        node.children.push(rowid.clone());
                    }
                }
                None => out.roots.push(rowid.clone()),
            }
        }
        out
    }

    /// Stable-sort every sibling group independently.
    pub fn sort_siblings<F>(&mut self, mut compare: F)
    where
        F: FnMut(&RowId, &RowId) -> Ordering,
    {
        self.roots.sort_by(&mut compare);
        for node in self.nodes.values_mut() {
            node.children.sort_by(&mut compare);
        }
    }

    /// Replace every sibling group with `reorder(group)`. The result must
    /// hold the same rows.
    pub fn reorder_siblings<F>(&mut self, mut reorder: F)
    where
        F: FnMut(&[RowId]) -> Vec<RowId>,
    {
        self.roots = reorder(&self.roots);
        for node in self.nodes.values_mut() {
            if node.children.len() > 1 {
                node.children = reorder(&node.children);
            }
        }
    }
}

fn report_unresolved(policy: UnresolvedParent, rowid: &RowId, parent_key: &str) {
    match policy {
        UnresolvedParent::Warn => tracing::warn!(
            target: targets::TREE,
            %rowid,
            parent_key,
            "parent not found; row placed at the root"
        ),
        UnresolvedParent::Error => tracing::error!(
            target: targets::TREE,
            %rowid,
            parent_key,
            "parent not found; row placed at the root"
        ),
    }
}

/// What an expand/collapse request changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandPlan {
    /// Nodes that became expanded.
    pub expanded: Vec<RowId>,
    /// Nodes that became collapsed (including accordion siblings).
    pub collapsed: Vec<RowId>,
    /// Nodes that must be lazily loaded before they can expand.
    pub load: Vec<RowId>,
    /// Nodes skipped because a load for them is already in flight.
    pub already_loading: Vec<RowId>,
}

impl ExpandPlan {
    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty() && self.collapsed.is_empty() && self.load.is_empty()
    }
}

/// Expanded and loading sets of a tree.
#[derive(Debug, Clone, Default)]
pub struct TreeExpandState {
    expanded: HashSet<RowId>,
    loading: HashSet<RowId>,
}

impl TreeExpandState {
    pub fn expanded(&self) -> &HashSet<RowId> {
        &self.expanded
    }

    pub fn is_expanded(&self, rowid: &RowId) -> bool {
        self.expanded.contains(rowid)
    }

    pub fn is_loading(&self, rowid: &RowId) -> bool {
        self.loading.contains(rowid)
    }

    /// Expand or collapse `rows`.
    ///
    /// With `accordion`, only the last requested row is toggled. Expanding it
    /// collapses its expanded siblings. `needs_load` tells whether a node has
    /// unloaded lazy children; such nodes are moved to the loading set and
    /// reported in [`ExpandPlan::load`] instead of being expanded. A node
    /// already loading is not requested twice. Nodes with no children and no
    /// pending load cannot expand.
    pub fn set_expanded<F>(
        &mut self,
        tree: &TreeStore,
        rows: &[RowId],
        expanded: bool,
        accordion: bool,
        mut needs_load: F,
    ) -> ExpandPlan
    where
        F: FnMut(&RowId) -> bool,
    {
        let mut plan = ExpandPlan::default();
        let targets: &[RowId] = if accordion {
            rows.last().map(std::slice::from_ref).unwrap_or(&[])
        } else {
            rows
        };

        for rowid in targets {
            if !tree.contains(rowid) {
                continue;
            }
            if expanded {
                if accordion {
                    for sibling in tree.siblings(rowid) {
                        if sibling != rowid && self.expanded.remove(sibling) {
                            plan.collapsed.push(sibling.clone());
                        }
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
                } else if tree.has_children(rowid) {
                    self.expanded.insert(rowid.clone());
                    plan.expanded.push(rowid.clone());
                }
            } else if self.expanded.remove(rowid) {
                plan.collapsed.push(rowid.clone());
            }
        }
        plan
    }

    /// Settle a lazy load. On success the node expands if it got children.
    pub fn finish_load(&mut self, tree: &TreeStore, rowid: &RowId, success: bool) -> bool {
        self.loading.remove(rowid);
        if success && tree.has_children(rowid) {
            self.expanded.insert(rowid.clone())
        } else {
            false
        }
    }

    /// Expand every node that has children.
    pub fn expand_all(&mut self, tree: &TreeStore) {
        tree.walk(|rowid, _, _| {
            if tree.has_children(rowid) {
                self.expanded.insert(rowid.clone());
            }
        });
    }

    pub fn collapse(&mut self, rowid: &RowId) -> bool {
        self.expanded.remove(rowid)
    }

    /// Collapse everything. Loads in flight are kept.
    pub fn clear(&mut self) -> Vec<RowId> {
        self.expanded.drain().collect()
    }

    /// Drop state for rows that no longer exist.
    pub fn retain_known(&mut self, tree: &TreeStore) {
        self.expanded.retain(|id| tree.contains(id));
        self.loading.retain(|id| tree.contains(id));
    }
}

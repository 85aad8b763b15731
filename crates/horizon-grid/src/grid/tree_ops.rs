//! Tree expansion and lazily loaded children.

use futures_util::future::join_all;
use serde_json::Value;

use horizon_grid_core::logging::targets;

use super::Grid;
use crate::error::{GridError, LoadError, Result};
use crate::events::GridEvent;
use crate::hooks::ExpandKind;
use crate::model::row_cache::RowId;
use crate::model::tree::{ExpandPlan, TreeStore};
use crate::record::{Record, get_path, is_truthy, set_path};

/// What an expand or collapse request did to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    Expanded,
    Collapsed,
    /// Lazy children were loaded; the row expanded if it got any.
    Loaded { children: usize },
    /// The loader failed; the row stays collapsed and can be retried.
    LoadFailed(LoadError),
    /// A load for this row is still in flight.
    AlreadyLoading,
    /// Already in the requested state, or has nothing to expand.
    Unchanged,
    /// The toggle hook refused.
    Refused,
}

impl ExpandOutcome {
    /// Outcomes for `requested` rows after applying `plan`.
    pub(super) fn from_plan(requested: &[RowId], plan: &ExpandPlan) -> Vec<(RowId, ExpandOutcome)> {
        requested
            .iter()
            .map(|rowid| {
                let outcome = if plan.expanded.contains(rowid) {
                    ExpandOutcome::Expanded
                } else if plan.collapsed.contains(rowid) {
                    ExpandOutcome::Collapsed
                } else if plan.already_loading.contains(rowid) {
                    ExpandOutcome::AlreadyLoading
                } else {
                    ExpandOutcome::Unchanged
                };
                (rowid.clone(), outcome)
            })
            .collect()
    }
}

impl Grid {
    /// Expand or collapse tree rows.
    ///
    /// Rows the toggle hook refuses are reported as [`ExpandOutcome::Refused`].
    /// In lazy mode a row flagged as having children that were never loaded
    /// is loaded first; loads started by one call run concurrently. A row
    /// already loading is not requested again.
    pub async fn set_tree_expand(
        &mut self,
        rows: &[RowId],
        expanded: bool,
    ) -> Result<Vec<(RowId, ExpandOutcome)>> {
        self.require_tree("set_tree_expand")?;
        let Some(config) = self.tree_config().cloned() else {
            return Err(GridError::TreeModeRequired {
                operation: "set_tree_expand",
            });
        };

        let mut outcomes = Vec::with_capacity(rows.len());
        let mut allowed = Vec::with_capacity(rows.len());
        for rowid in rows {
            if !self.records.contains_key(rowid) {
                continue;
            }
            if self.toggle_allowed(ExpandKind::Tree, rowid, expanded) {
                allowed.push(rowid.clone());
            } else {
                outcomes.push((rowid.clone(), ExpandOutcome::Refused));
            }
        }

        let lazy = config.lazy && self.hooks.load_children.is_some();
        let plan = {
            let Some(tree) = &self.tree else {
                return Ok(outcomes);
            };
            let records = &self.records;
            let rows = &self.rows;
            self.tree_expand
                .set_expanded(tree, &allowed, expanded, config.accordion, |rowid| {
                    lazy && !tree.has_children(rowid)
                        && rows.lookup(rowid).is_some_and(|e| !e.tree_loaded)
                        && records
                            .get(rowid)
                            .is_some_and(|r| is_truthy(get_path(r, &config.has_child_field)))
                })
        };

        let mut planned = ExpandOutcome::from_plan(&allowed, &plan);
        if !plan.expanded.is_empty() || !plan.collapsed.is_empty() {
            self.refresh_after();
            self.emit_tree_toggles(&plan.expanded, true);
            self.emit_tree_toggles(&plan.collapsed, false);
            self.notify();
        }

        if !plan.load.is_empty() {
            for (rowid, outcome) in self.load_tree_nodes(&plan.load).await {
                if let Some(slot) = planned.iter_mut().find(|(id, _)| id == &rowid) {
                    slot.1 = outcome;
                }
            }
        }
        outcomes.extend(planned);
        Ok(outcomes)
    }

    /// Run the children loader for `rows` and settle each load.
    async fn load_tree_nodes(&mut self, rows: &[RowId]) -> Vec<(RowId, ExpandOutcome)> {
        let Some(loader) = self.hooks.load_children.clone() else {
            return Vec::new();
        };
        let mut pending = Vec::with_capacity(rows.len());
        let mut futures = Vec::with_capacity(rows.len());
        for rowid in rows {
            match self.records.get(rowid) {
                Some(record) => {
                    futures.push(loader(record));
                    pending.push(rowid.clone());
                }
                None => {
                    if let Some(tree) = &self.tree {
                        self.tree_expand.finish_load(tree, rowid, false);
                    }
                }
            }
        }
        tracing::debug!(target: targets::TREE, rows = pending.len(), "loading tree children");
        let results = join_all(futures).await;

        let mut outcomes = Vec::with_capacity(pending.len());
        let mut opened = Vec::new();
        for (rowid, result) in pending.into_iter().zip(results) {
            let outcome = match result {
                Ok(children) => {
                    let count = self.attach_children(&rowid, children).len();
                    self.set_tree_loaded(&rowid, true);
                    if let Some(tree) = &self.tree {
                        if self.tree_expand.finish_load(tree, &rowid, true) {
                            opened.push(rowid.clone());
                        }
                    }
                    ExpandOutcome::Loaded { children: count }
                }
                Err(err) => {
                    tracing::warn!(
                        target: targets::TREE,
                        %rowid,
                        error = %err,
                        "tree children failed to load"
                    );
                    self.set_tree_loaded(&rowid, false);
                    if let Some(tree) = &self.tree {
                        self.tree_expand.finish_load(tree, &rowid, false);
                    }
                    ExpandOutcome::LoadFailed(err)
                }
            };
            outcomes.push((rowid, outcome));
        }
        self.handle_data();
        self.emit_tree_toggles(&opened, true);
        self.notify();
        outcomes
    }

    /// Flip the expansion of one tree row.
    pub async fn toggle_tree_expand(&mut self, rowid: &RowId) -> Result<ExpandOutcome> {
        let expanded = !self.tree_expand.is_expanded(rowid);
        let outcomes = self
            .set_tree_expand(std::slice::from_ref(rowid), expanded)
            .await?;
        Ok(outcomes
            .into_iter()
            .find(|(id, _)| id == rowid)
            .map(|(_, outcome)| outcome)
            .unwrap_or(ExpandOutcome::Unchanged))
    }

    /// Expand every row that has children, or collapse everything.
    ///
    /// Lazy rows that were never loaded are left alone.
    pub fn set_all_tree_expand(&mut self, expanded: bool) -> Result<()> {
        let tree = self.require_tree("set_all_tree_expand")?;
        let candidates: Vec<RowId> = if expanded {
            tree.flatten_all()
                .into_iter()
                .filter(|id| tree.has_children(id))
                .collect()
        } else {
            tree.flatten_all()
                .into_iter()
                .filter(|id| self.tree_expand.is_expanded(id))
                .collect()
        };
        let allowed: Vec<RowId> = candidates
            .into_iter()
            .filter(|id| self.toggle_allowed(ExpandKind::Tree, id, expanded))
            .collect();
        let plan = match &self.tree {
            Some(tree) => self
                .tree_expand
                .set_expanded(tree, &allowed, expanded, false, |_| false),
            None => ExpandPlan::default(),
        };
        self.refresh_after();
        self.emit_tree_toggles(&plan.expanded, true);
        self.emit_tree_toggles(&plan.collapsed, false);
        self.notify();
        Ok(())
    }

    /// Collapse every tree row. The toggle hook is not consulted.
    pub fn clear_tree_expand(&mut self) -> Result<()> {
        self.require_tree("clear_tree_expand")?;
        let collapsed = self.tree_expand.clear();
        self.refresh_after();
        self.emit_tree_toggles(&collapsed, false);
        self.notify();
        Ok(())
    }

    pub fn is_tree_expand_by_row(&self, rowid: &RowId) -> bool {
        self.tree_expand.is_expanded(rowid)
    }

    /// Whether the lazy children of `rowid` have been loaded.
    pub fn is_tree_expand_loaded(&self, rowid: &RowId) -> bool {
        self.rows.lookup(rowid).is_some_and(|e| e.tree_loaded)
    }

    /// Forget the lazily loaded children of `rowid` and collapse it, so the
    /// next expansion loads them again.
    pub fn clear_tree_expand_loaded(&mut self, rowid: &RowId) -> Result<()> {
        self.require_tree("clear_tree_expand_loaded")?;
        self.require_row(rowid)?;
        let collapsed = self.tree_expand.collapse(rowid);
        let dropped = match self.tree.as_mut() {
            Some(tree) => tree.replace_children(rowid, Vec::new()),
            None => Vec::new(),
        };
        self.forget_rows(&dropped);
        self.set_tree_loaded(rowid, false);
        self.rebuild_rows(false);
        self.handle_data();
        if collapsed {
            self.emit_tree_toggles(std::slice::from_ref(rowid), false);
        }
        self.notify();
        Ok(())
    }

    /// Load the children of `rowid` again and expand it.
    pub async fn reload_tree_expand(&mut self, rowid: &RowId) -> Result<ExpandOutcome> {
        self.clear_tree_expand_loaded(rowid)?;
        let outcomes = self
            .set_tree_expand(std::slice::from_ref(rowid), true)
            .await?;
        Ok(outcomes
            .into_iter()
            .find(|(id, _)| id == rowid)
            .map(|(_, outcome)| outcome)
            .unwrap_or(ExpandOutcome::Unchanged))
    }

    /// Attach `records` as the children of `rowid`, replacing any previous
    /// children. The row expands when it got children.
    pub fn load_tree_children(&mut self, rowid: &RowId, records: Vec<Record>) -> Result<Vec<RowId>> {
        self.require_tree("load_tree_children")?;
        self.require_row(rowid)?;
        let ids = self.attach_children(rowid, records);
        self.set_tree_loaded(rowid, true);
        let opened = match &self.tree {
            Some(tree) => self.tree_expand.finish_load(tree, rowid, true),
            None => false,
        };
        self.handle_data();
        if opened {
            self.emit_tree_toggles(std::slice::from_ref(rowid), true);
        }
        self.notify();
        Ok(ids)
    }

    /// Expanded tree rows, in full order.
    pub fn get_tree_expand_records(&self) -> Vec<&Record> {
        self.full_data()
            .iter()
            .filter(|id| self.tree_expand.is_expanded(id))
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    pub fn get_parent_row(&self, rowid: &RowId) -> Option<&Record> {
        let parent = self.tree.as_ref()?.parent(rowid)?;
        self.records.get(parent)
    }

    /// Graft `children` under `parent` in the full tree and register their
    /// records. Returns the ids of every attached row, nested ones included.
    fn attach_children(&mut self, parent: &RowId, children: Vec<Record>) -> Vec<RowId> {
        let Some(config) = self.config.tree.clone() else {
            return Vec::new();
        };
        let parent_key = self
            .records
            .get(parent)
            .and_then(|r| get_path(r, &config.row_field))
            .cloned()
            .unwrap_or(Value::Null);

        let rows = &mut self.rows;
        let nested_children = (!config.transform).then_some(config.children_field.as_str());
        rows.reserve_keys(&children, nested_children);
        let (graft, flat) = if config.transform {
            let mut flat = Vec::with_capacity(children.len());
            for mut record in children {
                record.remove(&config.map_children_field);
                set_path(&mut record, &config.parent_field, parent_key.clone());
                let rowid = rows.assign_id(&mut record);
                flat.push((rowid, record));
            }
            let graft = TreeStore::from_roots(flat.iter().map(|(id, _)| id.clone()).collect());
            (graft, flat)
        } else {
            TreeStore::from_nested(children, &config.children_field, |record| {
                rows.assign_id(record)
            })
        };

        let Some(tree) = self.tree.as_mut() else {
            return Vec::new();
        };
        let dropped = tree.replace_children(parent, Vec::new());
        let mut attached = Vec::with_capacity(flat.len());
        let mut records = Vec::with_capacity(flat.len());
        for (rowid, record) in flat {
            let known = self.records.contains_key(&rowid) && !dropped.contains(&rowid);
            if known || tree.contains(&rowid) {
                tracing::warn!(
                    target: targets::TREE,
                    %rowid,
                    "loaded child repeats a known row key; skipped"
                );
                continue;
            }
            attached.push(rowid.clone());
            records.push((rowid, record));
        }
        graft.walk(|rowid, _, graft_parent| {
            if !attached.contains(rowid) {
                return;
            }
            let under = graft_parent.unwrap_or(parent);
            tree.insert_child(under, None, rowid.clone());
        });

        self.forget_rows(&dropped);
        for (rowid, record) in records {
            if self.config.keep_source {
                self.source.insert(rowid.clone(), record.clone());
            }
            self.records.insert(rowid, record);
        }
        self.rebuild_rows(false);

        let strictly = self.config.checkbox.check_strictly;
        if !strictly && self.checkbox.is_checked(parent) {
            self.checkbox
                .set_checked(self.tree.as_ref(), &attached, true, false);
            self.mirror_check_field(&attached);
        }
        tracing::debug!(
            target: targets::TREE,
            %parent,
            children = attached.len(),
            "children attached"
        );
        attached
    }

    /// Drop records of rows that left the tree.
    fn forget_rows(&mut self, rows: &[RowId]) {
        for rowid in rows {
            self.records.remove(rowid);
            self.rows.remove(rowid);
        }
        self.checkbox.retain_known(|id| self.records.contains_key(id));
        self.row_expand.retain_known(|id| self.records.contains_key(id));
        if let Some(tree) = &self.tree {
            self.tree_expand.retain_known(tree);
        }
    }

    fn set_tree_loaded(&mut self, rowid: &RowId, loaded: bool) {
        if let Some(entry) = self.rows.lookup_mut(rowid) {
            entry.tree_loaded = loaded;
        }
    }

    fn emit_tree_toggles(&self, rows: &[RowId], expanded: bool) {
        for rowid in rows {
            self.dispatch_event(GridEvent::ToggleTreeExpand {
                row: rowid.clone(),
                expanded,
            });
        }
    }
}

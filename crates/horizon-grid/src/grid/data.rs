//! Dataset loading, insertion, removal and change tracking.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use horizon_grid_core::PerfSpan;
use horizon_grid_core::logging::{span_names, targets};

use super::Grid;
use crate::config::TreeConfig;
use crate::error::{GridError, Result};
use crate::model::row_cache::{RowCache, RowId};
use crate::model::tree::{TreeExpandState, TreeLink, TreeStore};
use crate::record::{Record, get_path, is_truthy, set_path};
use crate::view::checkbox::CheckboxSelection;
use crate::view::row_expand::RowExpandState;

/// Where [`Grid::insert_at`] places new rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    Top,
    Bottom,
    /// Right before the given row, as its sibling.
    Before(RowId),
}

/// Pending changes since the last load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recordset {
    pub insert_records: Vec<Record>,
    pub remove_records: Vec<Record>,
    pub update_records: Vec<Record>,
}

/// Key text of `field`, as used for tree parent matching.
fn key_of(record: &Record, field: &str) -> Option<String> {
    get_path(record, field)
        .and_then(RowId::from_value)
        .map(|id| id.as_str().to_string())
}

impl Grid {
    /// Replace the whole dataset.
    ///
    /// Edit state, selection, spans, checkbox and expansion state are reset;
    /// configured defaults (expanded and checked rows, initial spans) are
    /// applied to the new data. A record whose key repeats an earlier one is
    /// skipped.
    pub fn load_data(&mut self, records: Vec<Record>) {
        let _perf = PerfSpan::new(span_names::LOAD);
        self.source_input = if self.config.keep_source {
            records.clone()
        } else {
            Vec::new()
        };

        let mut rows = RowCache::new(self.rows.key_field().to_string());
        let nested_children = self
            .config
            .tree
            .as_ref()
            .filter(|tree| !tree.transform)
            .map(|tree| tree.children_field.clone());
        rows.reserve_keys(&records, nested_children.as_deref());
        let mut by_id = HashMap::with_capacity(records.len());
        self.full.clear();
        match self.config.tree.clone() {
            None => {
                for mut record in records {
                    let rowid = rows.assign_id(&mut record);
                    if by_id.contains_key(&rowid) {
                        warn_duplicate(&rowid);
                        continue;
                    }
                    self.full.push(rowid.clone());
                    by_id.insert(rowid, record);
                }
                self.tree = None;
            }
            Some(tree) if tree.transform => {
                let mut links = Vec::with_capacity(records.len());
                for mut record in records {
                    record.remove(&tree.map_children_field);
                    let rowid = rows.assign_id(&mut record);
                    if by_id.contains_key(&rowid) {
                        warn_duplicate(&rowid);
                        continue;
                    }
                    links.push(TreeLink {
                        rowid: rowid.clone(),
                        key: key_of(&record, &tree.row_field),
                        parent_key: key_of(&record, &tree.parent_field),
                    });
                    by_id.insert(rowid, record);
                }
                self.tree = Some(TreeStore::from_parent_keys(&links, tree.unresolved_parent));
            }
            Some(tree) => {
                let (store, flat) =
                    TreeStore::from_nested(records, &tree.children_field, |record| {
                        rows.assign_id(record)
                    });
                for (rowid, record) in flat {
                    if by_id.contains_key(&rowid) {
                        warn_duplicate(&rowid);
                        continue;
                    }
                    by_id.insert(rowid, record);
                }
                self.tree = Some(store);
            }
        }

        self.records = by_id;
        self.rows = rows;
        self.rebuild_rows(true);
        self.source = if self.config.keep_source {
            self.records.clone()
        } else {
            HashMap::new()
        };
        self.inserted.clear();
        self.removed.clear();

        self.edit.close();
        self.edit.clear_selected();
        self.focus_queue.cancel_where(|_| true);
        self.y_debounce.cancel();
        self.merges.clear();
        self.tree_expand = TreeExpandState::default();
        self.row_expand = RowExpandState::default();
        self.checkbox = CheckboxSelection::new();
        self.apply_default_state();

        self.handle_data();
        self.update_y_status();
        let spans = self.config.merge_cells.clone();
        if !spans.is_empty() {
            self.commit_merges(&spans);
            self.fit_windows();
        }
        tracing::debug!(
            target: targets::GRID,
            rows = self.records.len(),
            after = self.after.len(),
            tree = self.tree.is_some(),
            "data loaded"
        );
        self.notify();
    }

    /// Load `records` again from scratch.
    pub fn reload_data(&mut self, records: Vec<Record>) {
        self.load_data(records);
    }

    fn apply_default_state(&mut self) {
        if let (Some(tree), Some(config)) = (&self.tree, &self.config.tree) {
            if config.expand_all {
                self.tree_expand.expand_all(tree);
            } else if !config.expand_row_keys.is_empty() {
                let keys: Vec<RowId> = config
                    .expand_row_keys
                    .iter()
                    .map(|key| RowId::from(key.as_str()))
                    .collect();
                self.tree_expand
                    .set_expanded(tree, &keys, true, config.accordion, |_| false);
            }
        }

        let full = self.full_data();
        let expand = &self.config.expand;
        if expand.expand_all && !expand.accordion {
            self.row_expand.set_expanded(&full, true, false, |_| false);
        } else if !expand.expand_row_keys.is_empty() {
            let keys: Vec<RowId> = expand
                .expand_row_keys
                .iter()
                .map(|key| RowId::from(key.as_str()))
                .filter(|id| self.records.contains_key(id))
                .collect();
            self.row_expand
                .set_expanded(&keys, true, expand.accordion, |_| false);
        }

        let checkbox = self.config.checkbox.clone();
        let mut initial: Vec<RowId> = match &checkbox.check_field {
            Some(field) => full
                .iter()
                .filter(|id| {
                    self.records
                        .get(*id)
                        .is_some_and(|r| is_truthy(get_path(r, field)))
                })
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        if checkbox.check_all {
            self.checkbox.set_all(&full, true);
        } else {
            initial.extend(
                checkbox
                    .check_row_keys
                    .iter()
                    .map(|key| RowId::from(key.as_str()))
                    .filter(|id| self.records.contains_key(id)),
            );
        }
        if !initial.is_empty() {
            self.checkbox.set_checked(
                self.tree.as_ref(),
                &initial,
                true,
                checkbox.check_strictly,
            );
        }
        if checkbox.check_field.is_some() {
            self.mirror_check_field(&full);
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert records at the top.
    pub fn insert(&mut self, records: Vec<Record>) -> Result<Vec<RowId>> {
        self.insert_at(records, InsertPosition::Top)
    }

    /// Insert records at `position`. Returns the ids of the inserted rows.
    ///
    /// Flat rows are placed straight into the after-data without re-running
    /// filter or sort. In transform tree mode a record whose parent key
    /// matches an existing row becomes its child; an unmatched parent key
    /// puts it at the root.
    pub fn insert_at(&mut self, records: Vec<Record>, position: InsertPosition) -> Result<Vec<RowId>> {
        if let InsertPosition::Before(anchor) = &position {
            self.require_row(anchor)?;
            if self.tree.is_some() && !self.config.is_tree_transform() {
                return Err(GridError::TreeModeUnsupported {
                    operation: "insert_at",
                });
            }
        }

        let tree_config = self.config.tree.clone();
        self.rows.reserve_keys(&records, None);
        let mut fresh = Vec::with_capacity(records.len());
        for mut record in records {
            if let Some(config) = &tree_config {
                record.remove(&config.children_field);
                record.remove(&config.map_children_field);
            }
            let rowid = self.rows.assign_id(&mut record);
            if self.records.contains_key(&rowid) || fresh.iter().any(|(id, _)| id == &rowid) {
                warn_duplicate(&rowid);
                continue;
            }
            fresh.push((rowid, record));
        }
        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<RowId> = fresh.iter().map(|(id, _)| id.clone()).collect();
        match tree_config {
            None => self.place_flat(&ids, &position),
            Some(config) => self.place_in_tree(&mut fresh, &position, &config),
        }
        for (rowid, record) in fresh {
            self.records.insert(rowid, record);
        }
        self.inserted.extend(ids.iter().cloned());

        self.rebuild_rows(false);
        self.refresh_after();
        let mut positions: Vec<usize> = ids
            .iter()
            .filter_map(|id| self.rows.lookup(id).and_then(|e| e.flat_index))
            .collect();
        positions.sort_unstable();
        for at in positions {
            self.merges.rows_inserted(at, 1);
        }
        self.merges.reanchor_rows(&self.after);
        self.update_y_status();
        tracing::debug!(target: targets::ROWS, inserted = ids.len(), "rows inserted");
        self.notify();
        Ok(ids)
    }

    fn place_flat(&mut self, ids: &[RowId], position: &InsertPosition) {
        let (full_at, after_at) = match position {
            InsertPosition::Top => (0, 0),
            InsertPosition::Bottom => (self.full.len(), self.after.len()),
            InsertPosition::Before(anchor) => (
                self.full
                    .iter()
                    .position(|id| id == anchor)
                    .unwrap_or(self.full.len()),
                self.after
                    .iter()
                    .position(|id| id == anchor)
                    .unwrap_or(self.after.len()),
            ),
        };
        self.full.splice(full_at..full_at, ids.iter().cloned());
        self.after.splice(after_at..after_at, ids.iter().cloned());
    }

    fn place_in_tree(
        &mut self,
        fresh: &mut [(RowId, Record)],
        position: &InsertPosition,
        config: &TreeConfig,
    ) {
        // Next insertion index per parent, so Top keeps the input order.
        let mut top_slots: HashMap<Option<RowId>, usize> = HashMap::new();
        for (rowid, record) in fresh.iter_mut() {
            let parent = match position {
                InsertPosition::Before(anchor) => {
                    let parent = self.tree.as_ref().and_then(|t| t.parent(anchor)).cloned();
                    let parent_key = parent
                        .as_ref()
                        .and_then(|p| self.records.get(p))
                        .and_then(|p| get_path(p, &config.row_field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    set_path(record, &config.parent_field, parent_key);
                    parent
                }
                _ if config.transform => self.match_parent(record, config),
                _ => None,
            };

            let index = match position {
                InsertPosition::Top => {
                    let slot = top_slots.entry(parent.clone()).or_insert(0);
                    *slot += 1;
                    Some(*slot - 1)
                }
                _ => None,
            };

            for store in [self.tree.as_mut(), self.after_tree.as_mut()].into_iter().flatten() {
                match (position, &parent) {
                    (InsertPosition::Before(anchor), _) if store.contains(anchor) => {
                        store.insert_before(anchor, rowid.clone());
                    }
                    (_, Some(parent)) if store.contains(parent) => {
                        store.insert_child(parent, index, rowid.clone());
                    }
                    // Parent filtered out of the after tree: the row stays
                    // hidden until the next pipeline run.
                    (_, Some(_)) => {}
                    (_, None) => store.insert_root(index, rowid.clone()),
                }
            }
        }
    }

    /// Existing row whose row key equals the parent key of `record`.
    fn match_parent(&self, record: &Record, config: &TreeConfig) -> Option<RowId> {
        let parent_key = key_of(record, &config.parent_field)?;
        let found = self
            .tree
            .as_ref()?
            .flatten_all()
            .into_iter()
            .find(|id| {
                self.records
                    .get(id)
                    .and_then(|r| key_of(r, &config.row_field))
                    .is_some_and(|key| key == parent_key)
            });
        if found.is_none() {
            tracing::warn!(
                target: targets::TREE,
                parent_key,
                "insert parent not found; row placed at the root"
            );
        }
        found
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Remove rows (with their subtrees in tree mode). Unknown rows are
    /// skipped. Returns the removed records.
    pub fn remove(&mut self, rows: &[RowId]) -> Vec<Record> {
        let mut removing = Vec::new();
        let mut doomed = HashSet::new();
        for rowid in rows {
            if !self.records.contains_key(rowid) {
                continue;
            }
            let subtree = match &self.tree {
                Some(tree) => tree.subtree(rowid),
                None => vec![rowid.clone()],
            };
            for id in subtree {
                if doomed.insert(id.clone()) {
                    removing.push(id);
                }
            }
        }
        if removing.is_empty() {
            return Vec::new();
        }

        if self
            .edit
            .actived()
            .is_some_and(|active| doomed.contains(&active.row))
        {
            self.clear_edit();
        }

        let mut positions: Vec<(usize, RowId)> = removing
            .iter()
            .filter_map(|id| {
                self.rows
                    .lookup(id)
                    .and_then(|e| e.flat_index)
                    .map(|at| (at, id.clone()))
            })
            .collect();
        positions.sort_by(|a, b| b.0.cmp(&a.0));
        for (at, rowid) in &positions {
            self.merges.row_removed(*at, rowid);
        }

        for store in [self.tree.as_mut(), self.after_tree.as_mut()].into_iter().flatten() {
            for rowid in &removing {
                store.remove_subtree(rowid);
            }
        }
        self.full.retain(|id| !doomed.contains(id));
        self.after.retain(|id| !doomed.contains(id));

        let mut removed = Vec::with_capacity(removing.len());
        for rowid in &removing {
            let Some(record) = self.records.remove(rowid) else {
                continue;
            };
            self.rows.remove(rowid);
            match self.inserted.iter().position(|id| id == rowid) {
                Some(pos) => {
                    self.inserted.remove(pos);
                }
                None => self.removed.push(record.clone()),
            }
            removed.push(record);
        }

        self.merges.retain_anchors(|id| self.records.contains_key(id));
        if self.records.is_empty() {
            self.merges.clear();
        }
        self.checkbox.retain_known(|id| self.records.contains_key(id));
        self.row_expand.retain_known(|id| self.records.contains_key(id));
        if let Some(tree) = &self.tree {
            self.tree_expand.retain_known(tree);
        }
        self.edit.forget_selected_rows(|id| doomed.contains(id));

        self.rebuild_rows(false);
        self.refresh_after();
        self.update_y_status();
        tracing::debug!(target: targets::ROWS, removed = removed.len(), "rows removed");
        self.notify();
        removed
    }

    /// Remove every checked row.
    pub fn remove_checkbox_row(&mut self) -> Vec<Record> {
        let rows = self.checkbox.checked_in(&self.full_data());
        self.remove(&rows)
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    pub fn get_recordset(&self) -> Recordset {
        Recordset {
            insert_records: self.get_insert_records(),
            remove_records: self.get_remove_records(),
            update_records: self.get_update_records(),
        }
    }

    /// Rows inserted since the last load, in insertion order.
    pub fn get_insert_records(&self) -> Vec<Record> {
        self.inserted
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// Loaded rows removed since the last load.
    pub fn get_remove_records(&self) -> Vec<Record> {
        self.removed.clone()
    }

    /// Loaded rows whose cells differ from the source snapshot. Always empty
    /// without `keep_source`.
    pub fn get_update_records(&self) -> Vec<Record> {
        self.full_data()
            .iter()
            .filter(|id| self.is_update_by_row(id))
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub fn is_insert_by_row(&self, rowid: &RowId) -> bool {
        self.inserted.contains(rowid)
    }

    /// Whether any column value of a loaded row differs from the source
    /// snapshot.
    pub fn is_update_by_row(&self, rowid: &RowId) -> bool {
        if !self.config.keep_source {
            return false;
        }
        let (Some(current), Some(source)) = (self.records.get(rowid), self.source.get(rowid)) else {
            return false;
        };
        let accessor = &self.hooks.accessor;
        self.columns
            .leaves()
            .filter(|(_, column)| column.field.is_some())
            .any(|(_, column)| {
                accessor.get_cell_value(current, column) != accessor.get_cell_value(source, column)
            })
    }

    /// Restore rows from the source snapshot.
    ///
    /// With `None` the whole last load is restored, dropping inserts and
    /// bringing removed rows back. With explicit rows, inserted ones among
    /// them are removed and the others get their source values back.
    pub fn revert_data(&mut self, rows: Option<&[RowId]>) -> Result<()> {
        if !self.config.keep_source {
            return Err(GridError::config("revert_data requires keep_source"));
        }
        let Some(rows) = rows else {
            let input = self.source_input.clone();
            self.load_data(input);
            return Ok(());
        };

        let (inserted, loaded): (Vec<RowId>, Vec<RowId>) = rows
            .iter()
            .filter(|id| self.records.contains_key(*id))
            .cloned()
            .partition(|id| self.inserted.contains(id));
        if self
            .edit
            .actived()
            .is_some_and(|active| loaded.contains(&active.row))
        {
            self.close_active();
        }
        for rowid in &loaded {
            if let Some(source) = self.source.get(rowid) {
                self.records.insert(rowid.clone(), source.clone());
            }
        }
        if !inserted.is_empty() {
            self.remove(&inserted);
        }
        self.handle_data();
        self.notify();
        Ok(())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Every record, in full order (depth-first in tree mode).
    pub fn get_full_data(&self) -> Vec<Record> {
        self.full_data()
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// Records after filter, sort and tree expansion.
    pub fn get_table_records(&self) -> Vec<&Record> {
        self.after.iter().filter_map(|id| self.records.get(id)).collect()
    }

    /// The tree as nested records.
    ///
    /// Children are embedded under the children field, or under the mapped
    /// children field in transform mode (the flat shape is left as loaded).
    pub fn get_full_data_tree(&self) -> Result<Vec<Record>> {
        let tree = self.require_tree("get_full_data_tree")?;
        let field = match self.tree_config() {
            Some(config) if config.transform => config.map_children_field.clone(),
            Some(config) => config.children_field.clone(),
            None => return Err(GridError::TreeModeRequired {
                operation: "get_full_data_tree",
            }),
        };
        Ok(tree
            .roots()
            .iter()
            .filter_map(|id| self.embed_children(tree, id, &field))
            .collect())
    }

    fn embed_children(&self, tree: &TreeStore, rowid: &RowId, field: &str) -> Option<Record> {
        let mut record = self.records.get(rowid)?.clone();
        let children: Vec<Value> = tree
            .children(rowid)
            .iter()
            .filter_map(|child| self.embed_children(tree, child, field))
            .map(Value::Object)
            .collect();
        if !children.is_empty() {
            record.insert(field.to_string(), Value::Array(children));
        }
        Some(record)
    }
}

fn warn_duplicate(rowid: &RowId) {
    tracing::warn!(target: targets::ROWS, %rowid, "duplicate row key; record skipped");
}

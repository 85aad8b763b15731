//! Tests for data operations: change tracking, revert, sort, filter,
//! columns and checkbox selection.

mod common;

use serde_json::json;

use horizon_grid::prelude::*;

use common::{EventLog, after_keys, full_keys, id, ids, keyed_config, numbered_grid, records};

fn tracked_grid() -> Grid {
    let mut config = keyed_config();
    config.keep_source = true;
    let mut grid = Grid::new(config, vec![Column::new("name").editable(), Column::new("age")]);
    grid.load_data(records(vec![
        json!({"id": 1, "name": "ann", "age": 31}),
        json!({"id": 2, "name": "bob", "age": 25}),
        json!({"id": 3, "name": "cy", "age": 40}),
    ]));
    grid
}

// ============================================================================
// Change tracking
// ============================================================================

#[test]
fn test_recordset_tracks_insert_remove_and_update() {
    let mut grid = tracked_grid();
    grid.insert(records(vec![json!({"id": 4, "name": "dee"})])).unwrap();
    grid.remove(&ids(&["2"]));

    let recordset = grid.get_recordset();
    assert_eq!(recordset.insert_records.len(), 1);
    assert_eq!(recordset.insert_records[0]["name"], json!("dee"));
    assert_eq!(recordset.remove_records.len(), 1);
    assert_eq!(recordset.remove_records[0]["name"], json!("bob"));
    assert!(recordset.update_records.is_empty());
}

#[test]
fn test_removing_inserted_row_is_not_a_removal() {
    let mut grid = tracked_grid();
    grid.insert(records(vec![json!({"id": 9})])).unwrap();

    let removed = grid.remove(&ids(&["9"]));

    assert_eq!(removed.len(), 1);
    assert!(grid.get_insert_records().is_empty());
    assert!(grid.get_remove_records().is_empty());
}

#[test]
fn test_committed_edit_marks_row_updated() {
    let mut config = keyed_config().with_edit(EditMode::Cell);
    config.keep_source = true;
    let mut grid = Grid::new(config, vec![Column::new("name").editable(), Column::new("age")]);
    grid.load_data(records(vec![json!({"id": 1, "name": "ann"}), json!({"id": 2, "name": "bob"})]));

    pollster::block_on(grid.set_edit_cell(&id("1"), "name"));
    assert!(grid.set_edit_value(json!("anne")));
    assert!(grid.clear_edit());

    assert!(grid.is_update_by_row(&id("1")));
    assert!(!grid.is_update_by_row(&id("2")));
    assert_eq!(grid.get_update_records()[0]["name"], json!("anne"));
}

#[test]
fn test_revert_all_restores_last_load() {
    let mut grid = tracked_grid();
    grid.insert(records(vec![json!({"id": 4})])).unwrap();
    grid.remove(&ids(&["1"]));

    grid.revert_data(None).unwrap();

    assert_eq!(full_keys(&grid), vec!["1", "2", "3"]);
    assert_eq!(grid.get_recordset(), Recordset::default());
}

#[test]
fn test_revert_rows_drops_inserts_only_among_them() {
    let mut grid = tracked_grid();
    grid.insert(records(vec![json!({"id": 4}), json!({"id": 5})])).unwrap();

    grid.revert_data(Some(&ids(&["4", "2"]))).unwrap();

    assert_eq!(full_keys(&grid), vec!["5", "1", "2", "3"]);
    assert!(grid.is_insert_by_row(&id("5")));
}

#[test]
fn test_revert_rows_closes_edit_and_drops_pending_value() {
    let mut config = keyed_config().with_edit(EditMode::Cell);
    config.keep_source = true;
    let mut grid = Grid::new(config, vec![Column::new("name").editable()]);
    grid.load_data(records(vec![json!({"id": 1, "name": "ann"}), json!({"id": 2, "name": "bob"})]));
    pollster::block_on(grid.set_edit_cell(&id("1"), "name"));
    grid.set_edit_value(json!("anne"));
    let log = EventLog::attach(&grid);

    grid.revert_data(Some(&ids(&["1"]))).unwrap();

    assert_eq!(log.names(), vec!["edit-closed"]);
    assert!(grid.get_actived().is_none());
    assert_eq!(grid.settle(), 0);
    assert_eq!(grid.get_row_by_id(&id("1")).unwrap()["name"], json!("ann"));
    assert!(!grid.is_update_by_row(&id("1")));
}

#[test]
fn test_revert_requires_source() {
    let mut grid = numbered_grid(keyed_config(), vec![Column::new("name")], 2);

    assert!(matches!(grid.revert_data(None), Err(GridError::Config { .. })));
}

// ============================================================================
// Sort and filter
// ============================================================================

#[test]
fn test_toggle_sort_cycles_and_reports() {
    let mut grid = tracked_grid();
    grid.reload_column(vec![Column::new("name"), Column::new("age").sortable()]);
    let log = EventLog::attach(&grid);

    assert_eq!(grid.toggle_sort("age").unwrap(), Some(SortOrder::Asc));
    assert_eq!(after_keys(&grid), vec!["2", "1", "3"]);
    assert_eq!(grid.toggle_sort("age").unwrap(), Some(SortOrder::Desc));
    assert_eq!(after_keys(&grid), vec!["3", "1", "2"]);
    assert_eq!(grid.toggle_sort("age").unwrap(), None);
    assert_eq!(after_keys(&grid), vec!["1", "2", "3"]);
    // Not sortable.
    assert_eq!(grid.toggle_sort("name").unwrap(), None);

    assert_eq!(log.names(), vec!["sort-change", "sort-change", "sort-change"]);
}

#[test]
fn test_single_sort_replaces_previous_column() {
    let columns = vec![Column::new("name").sortable(), Column::new("age").sortable()];
    let mut grid = numbered_grid(keyed_config(), columns, 4);

    grid.sort("name", Some(SortOrder::Desc)).unwrap();
    grid.sort("age", Some(SortOrder::Asc)).unwrap();

    assert!(!grid.is_sort("name"));
    assert!(grid.is_sort("age"));
    assert_eq!(grid.get_sort_columns().len(), 1);
}

#[test]
fn test_multi_sort_ranks_by_toggle_time_when_chronological() {
    let mut config = keyed_config();
    config.sort.multiple = true;
    config.sort.chronological = true;
    let columns = vec![Column::new("group").sortable(), Column::new("rank").sortable()];
    let mut grid = Grid::new(config, columns);
    grid.load_data(records(vec![
        json!({"id": "a", "group": 2, "rank": 1}),
        json!({"id": "b", "group": 1, "rank": 2}),
        json!({"id": "c", "group": 1, "rank": 1}),
    ]));

    grid.sort("rank", Some(SortOrder::Asc)).unwrap();
    grid.sort("group", Some(SortOrder::Asc)).unwrap();

    let ranked: Vec<ColumnId> = grid.get_sort_columns().iter().map(|s| s.column).collect();
    assert_eq!(ranked, vec![grid.get_column_id("rank").unwrap(), grid.get_column_id("group").unwrap()]);
    assert_eq!(after_keys(&grid), vec!["c", "a", "b"]);
}

#[test]
fn test_sort_unknown_column_fails() {
    let mut grid = tracked_grid();

    assert!(matches!(
        grid.sort("missing", Some(SortOrder::Asc)),
        Err(GridError::ColumnNotFound { .. })
    ));
}

#[test]
fn test_filter_checked_options_and_clear() {
    let mut grid = tracked_grid();
    let log = EventLog::attach(&grid);
    grid.set_filter(
        "name",
        vec![FilterOption::new("ann"), FilterOption::new("cy"), FilterOption::new("bob")],
    )
    .unwrap();
    assert_eq!(after_keys(&grid), vec!["1", "2", "3"]);
    assert!(!grid.is_filter(None));

    grid.set_filter_checked("name", &[json!("ann"), json!("cy")], true).unwrap();
    assert_eq!(after_keys(&grid), vec!["1", "3"]);
    assert!(grid.is_filter(Some("name".into())));

    grid.clear_filter(None).unwrap();
    assert_eq!(after_keys(&grid), vec!["1", "2", "3"]);
    assert!(!grid.is_filter(None));
    assert!(log.names().iter().all(|name| *name == "filter-change"));
}

#[test]
fn test_column_filter_method_overrides_default() {
    let column = Column::new("age").with_filter_method(|params| {
        params.cell_value.as_f64().unwrap_or(0.0) >= params.option.value.as_f64().unwrap_or(0.0)
    });
    let mut grid = Grid::new(keyed_config(), vec![column]);
    grid.load_data(records(vec![
        json!({"id": 1, "age": 18}),
        json!({"id": 2, "age": 30}),
        json!({"id": 3, "age": 45}),
    ]));

    grid.set_filter("age", vec![FilterOption::new(30).checked()]).unwrap();

    assert_eq!(after_keys(&grid), vec!["2", "3"]);
}

#[test]
fn test_grid_filter_method_gets_whole_option_list() {
    let hooks = GridHooks::new().with_filter_method(|params| {
        let bounds: Vec<f64> = params.values().filter_map(|v| v.as_f64()).collect();
        let age = params.cell_value.as_f64().unwrap_or(0.0);
        bounds.len() == 2 && age >= bounds[0].min(bounds[1]) && age <= bounds[0].max(bounds[1])
    });
    let mut grid = tracked_grid().with_hooks(hooks);

    grid.set_filter("age", vec![FilterOption::new(25).checked(), FilterOption::new(35).checked()])
        .unwrap();

    assert_eq!(after_keys(&grid), vec!["1", "2"]);
}

#[test]
fn test_grid_sort_method_replaces_builtin_order() {
    // Shortest value of the sorted field first.
    let hooks = GridHooks::new().with_sort_method(|params| {
        let field = params.sort_list[0].column.field.clone().unwrap_or_default();
        let mut rows = params.rows.to_vec();
        rows.sort_by_key(|id| params.records[id][field.as_str()].as_str().map_or(0, str::len));
        rows
    });
    let mut grid = Grid::new(keyed_config(), vec![Column::new("name").sortable()]).with_hooks(hooks);
    grid.load_data(records(vec![
        json!({"id": 1, "name": "beatrice"}),
        json!({"id": 2, "name": "al"}),
        json!({"id": 3, "name": "cyd"}),
    ]));

    grid.sort("name", Some(SortOrder::Asc)).unwrap();
    assert_eq!(after_keys(&grid), vec!["2", "3", "1"]);

    grid.clear_sort(None).unwrap();
    assert_eq!(after_keys(&grid), vec!["1", "2", "3"]);
}

#[test]
fn test_grid_sort_method_orders_each_sibling_group() {
    let hooks = GridHooks::new().with_sort_method(|params| params.rows.iter().rev().cloned().collect());
    let config = keyed_config().with_tree(TreeConfig::transform("id", "pid"));
    let mut grid = Grid::new(config, vec![Column::new("name").sortable().tree_node()]).with_hooks(hooks);
    grid.load_data(records(vec![
        json!({"id": 1, "pid": null, "name": "a"}),
        json!({"id": 2, "pid": 1, "name": "b"}),
        json!({"id": 3, "pid": 1, "name": "c"}),
        json!({"id": 4, "pid": null, "name": "d"}),
    ]));
    grid.set_all_tree_expand(true).unwrap();

    grid.sort("name", Some(SortOrder::Asc)).unwrap();

    assert_eq!(after_keys(&grid), vec!["4", "1", "3", "2"]);
    assert_eq!(full_keys(&grid), vec!["1", "2", "3", "4"]);
}

// ============================================================================
// Columns
// ============================================================================

#[test]
fn test_hide_and_show_column_updates_visible_indices() {
    let columns = vec![Column::new("a"), Column::new("b"), Column::new("c")];
    let mut grid = numbered_grid(keyed_config(), columns, 2);

    assert!(grid.hide_column("b").unwrap());
    assert_eq!(grid.get_vt_column_index("c"), Some(1));
    assert_eq!(grid.get_vt_column_index("b"), None);
    assert_eq!(grid.get_column_index("c"), Some(2));
    assert_eq!(grid.table_column().len(), 2);

    assert!(!grid.hide_column("b").unwrap());
    assert!(grid.show_column("b").unwrap());
    assert_eq!(grid.get_vt_column_index("c"), Some(2));
    assert!(grid.hide_column("zzz").is_err());
}

// ============================================================================
// Checkbox selection
// ============================================================================

fn checkbox_tree() -> Grid {
    let config = keyed_config().with_tree(TreeConfig::transform("id", "pid"));
    let mut grid = Grid::new(config, vec![Column::new("name")]);
    grid.load_data(records(vec![
        json!({"id": 1, "pid": null}),
        json!({"id": 2, "pid": 1}),
        json!({"id": 3, "pid": 1}),
        json!({"id": 4, "pid": null}),
    ]));
    grid
}

#[test]
fn test_checking_children_updates_parent() {
    let mut grid = checkbox_tree();

    grid.set_checkbox_row(&ids(&["2"]), true);
    assert!(grid.is_indeterminate_by_row(&id("1")));
    assert!(!grid.is_checked_by_row(&id("1")));

    let changed = grid.set_checkbox_row(&ids(&["3"]), true);
    assert_eq!(changed, ids(&["3", "1"]));
    assert!(grid.is_checked_by_row(&id("1")));
    assert!(!grid.is_indeterminate_by_row(&id("1")));
}

#[test]
fn test_checking_parent_cascades_to_subtree() {
    let mut grid = checkbox_tree();
    let log = EventLog::attach(&grid);

    let changed = grid.set_checkbox_row(&ids(&["1"]), true);

    assert_eq!(changed, ids(&["1", "2", "3"]));
    assert_eq!(grid.get_checkbox_records().len(), 3);
    assert_eq!(log.names(), vec!["checkbox-change"]);

    grid.set_checkbox_row(&ids(&["2"]), false);
    assert!(grid.is_indeterminate_by_row(&id("1")));
}

#[test]
fn test_strict_checkbox_does_not_cascade() {
    let mut config = keyed_config().with_tree(TreeConfig::transform("id", "pid"));
    config.checkbox.check_strictly = true;
    let mut grid = Grid::new(config, vec![Column::new("name")]);
    grid.load_data(records(vec![json!({"id": 1, "pid": null}), json!({"id": 2, "pid": 1})]));

    let changed = grid.set_checkbox_row(&ids(&["1"]), true);

    assert_eq!(changed, ids(&["1"]));
    assert!(!grid.is_checked_by_row(&id("2")));
    assert!(!grid.is_indeterminate_by_row(&id("1")));
}

#[test]
fn test_check_all_respects_check_method() {
    let hooks = GridHooks::new().with_check_method(|record| record["id"] != json!(2));
    let mut grid = numbered_grid(keyed_config(), vec![Column::new("name")], 3).with_hooks(hooks);

    let changed = grid.set_all_checkbox_row(true);

    assert_eq!(changed, ids(&["1", "3"]));
    assert!(!grid.is_all_checkbox_checked());
    assert!(!grid.toggle_checkbox_row(&id("2")));
}

#[test]
fn test_check_field_mirrors_state_and_seeds_load() {
    let mut config = keyed_config();
    config.checkbox.check_field = Some("selected".into());
    let mut grid = Grid::new(config, vec![Column::new("name")]);
    grid.load_data(records(vec![
        json!({"id": 1, "selected": true}),
        json!({"id": 2}),
    ]));
    assert!(grid.is_checked_by_row(&id("1")));
    assert_eq!(grid.get_row_by_id(&id("2")).unwrap()["selected"], json!(false));

    grid.toggle_checkbox_row(&id("2"));

    assert_eq!(grid.get_row_by_id(&id("2")).unwrap()["selected"], json!(true));
    assert!(grid.is_all_checkbox_checked());
    let removed = grid.remove_checkbox_row();
    assert_eq!(removed.len(), 2);
    assert!(grid.after_data().is_empty());
}

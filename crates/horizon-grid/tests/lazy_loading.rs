//! Tests for lazily loaded tree children and row details.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use pollster::block_on;
use serde_json::json;

use horizon_grid::prelude::*;

use common::{EventLog, after_keys, id, ids, init_tracing, keyed_config, records};

type ChildLoad = BoxFuture<'static, std::result::Result<Vec<Record>, LoadError>>;

fn lazy_tree_config() -> GridConfig {
    let mut tree = TreeConfig::transform("id", "pid");
    tree.lazy = true;
    keyed_config().with_tree(tree)
}

fn lazy_tree_grid(hooks: GridHooks) -> Grid {
    init_tracing();
    let mut grid = Grid::new(lazy_tree_config(), vec![Column::new("name").tree_node()]).with_hooks(hooks);
    grid.load_data(records(vec![
        json!({"id": 1, "pid": null, "name": "root", "hasChild": true}),
        json!({"id": 2, "pid": null, "name": "plain"}),
    ]));
    grid
}

/// Loader answering every row with two children keyed `<parent>0` and
/// `<parent>1`. Fails while `failures` is above zero.
fn child_loader(
    calls: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
) -> impl Fn(&Record) -> ChildLoad + Send + Sync + 'static {
    move |record: &Record| {
        calls.fetch_add(1, Ordering::SeqCst);
        let parent = record["id"].to_string();
        let failing = failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if failing {
            Err(LoadError::new("backend unavailable"))
        } else {
            Ok(records(vec![
                json!({"id": format!("{parent}0"), "name": "child a"}),
                json!({"id": format!("{parent}1"), "name": "child b"}),
            ]))
        };
        ready(result).boxed()
    }
}

// ============================================================================
// Tree children
// ============================================================================

#[test]
fn test_lazy_children_load_then_expand() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = child_loader(calls.clone(), Arc::new(AtomicUsize::new(0)));
    let mut grid = lazy_tree_grid(GridHooks::new().with_load_children(loader));
    let log = EventLog::attach(&grid);

    let outcomes = block_on(grid.set_tree_expand(&ids(&["1"]), true)).unwrap();

    assert_eq!(outcomes, vec![(id("1"), ExpandOutcome::Loaded { children: 2 })]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(grid.is_tree_expand_by_row(&id("1")));
    assert!(grid.is_tree_expand_loaded(&id("1")));
    assert_eq!(after_keys(&grid), vec!["1", "10", "11", "2"]);
    assert_eq!(grid.get_row_by_id(&id("10")).unwrap()["pid"], json!(1));
    assert_eq!(log.names(), vec!["toggle-tree-expand"]);
}

#[test]
fn test_loaded_children_are_not_loaded_again() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = child_loader(calls.clone(), Arc::new(AtomicUsize::new(0)));
    let mut grid = lazy_tree_grid(GridHooks::new().with_load_children(loader));

    block_on(grid.set_tree_expand(&ids(&["1"]), true)).unwrap();
    block_on(grid.set_tree_expand(&ids(&["1"]), false)).unwrap();
    let outcome = block_on(grid.toggle_tree_expand(&id("1"))).unwrap();

    assert_eq!(outcome, ExpandOutcome::Expanded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_load_stays_collapsed_and_can_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = child_loader(calls.clone(), Arc::new(AtomicUsize::new(1)));
    let mut grid = lazy_tree_grid(GridHooks::new().with_load_children(loader));

    let outcome = block_on(grid.toggle_tree_expand(&id("1"))).unwrap();
    assert_eq!(
        outcome,
        ExpandOutcome::LoadFailed(LoadError::new("backend unavailable"))
    );
    assert!(!grid.is_tree_expand_by_row(&id("1")));
    assert!(!grid.is_tree_expand_loaded(&id("1")));
    assert_eq!(after_keys(&grid), vec!["1", "2"]);

    let outcome = block_on(grid.toggle_tree_expand(&id("1"))).unwrap();
    assert_eq!(outcome, ExpandOutcome::Loaded { children: 2 });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(grid.is_tree_expand_by_row(&id("1")));
}

#[test]
fn test_row_without_child_flag_is_not_loaded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = child_loader(calls.clone(), Arc::new(AtomicUsize::new(0)));
    let mut grid = lazy_tree_grid(GridHooks::new().with_load_children(loader));

    let outcome = block_on(grid.toggle_tree_expand(&id("2"))).unwrap();

    assert_eq!(outcome, ExpandOutcome::Unchanged);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reload_tree_expand_replaces_children() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = child_loader(calls.clone(), Arc::new(AtomicUsize::new(0)));
    let mut grid = lazy_tree_grid(GridHooks::new().with_load_children(loader));

    block_on(grid.set_tree_expand(&ids(&["1"]), true)).unwrap();
    let outcome = block_on(grid.reload_tree_expand(&id("1"))).unwrap();

    assert_eq!(outcome, ExpandOutcome::Loaded { children: 2 });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(after_keys(&grid), vec!["1", "10", "11", "2"]);
    assert_eq!(grid.get_full_data().len(), 4);
}

#[test]
fn test_clear_tree_expand_loaded_forgets_children() {
    let loader = child_loader(Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let mut grid = lazy_tree_grid(GridHooks::new().with_load_children(loader));
    block_on(grid.set_tree_expand(&ids(&["1"]), true)).unwrap();

    grid.clear_tree_expand_loaded(&id("1")).unwrap();

    assert!(!grid.is_tree_expand_loaded(&id("1")));
    assert!(!grid.is_tree_expand_by_row(&id("1")));
    assert!(grid.get_row_by_id(&id("10")).is_none());
    assert_eq!(after_keys(&grid), vec!["1", "2"]);
}

#[test]
fn test_load_tree_children_by_hand() {
    let mut grid = lazy_tree_grid(GridHooks::new());

    let attached = grid
        .load_tree_children(&id("2"), records(vec![json!({"id": 20, "name": "manual"})]))
        .unwrap();

    assert_eq!(attached, ids(&["20"]));
    assert!(grid.is_tree_expand_by_row(&id("2")));
    assert_eq!(grid.get_parent_row(&id("20")).unwrap()["name"], json!("plain"));
    assert_eq!(after_keys(&grid), vec!["1", "2", "20"]);
}

// ============================================================================
// Row details
// ============================================================================

fn detail_grid(hooks: GridHooks) -> Grid {
    let mut config = keyed_config();
    config.expand.lazy = true;
    let mut grid = Grid::new(config, vec![Column::new("name")]).with_hooks(hooks);
    grid.load_data(records(vec![json!({"id": 1}), json!({"id": 2})]));
    grid
}

#[test]
fn test_row_detail_loads_before_expanding() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let hooks = GridHooks::new().with_load_row_detail(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        ready(Ok(())).boxed()
    });
    let mut grid = detail_grid(hooks);

    let outcome = block_on(grid.toggle_row_expand(&id("1")));
    assert_eq!(outcome, ExpandOutcome::Loaded { children: 0 });
    assert!(grid.is_row_expand_by_row(&id("1")));
    assert!(grid.is_row_expand_loaded(&id("1")));

    block_on(grid.toggle_row_expand(&id("1")));
    let outcome = block_on(grid.toggle_row_expand(&id("1")));
    assert_eq!(outcome, ExpandOutcome::Expanded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_row_detail_failure_leaves_row_collapsed() {
    let hooks = GridHooks::new()
        .with_load_row_detail(|_| ready(Err(LoadError::new("timeout"))).boxed());
    let mut grid = detail_grid(hooks);
    let log = EventLog::attach(&grid);

    let outcome = block_on(grid.toggle_row_expand(&id("2")));

    assert_eq!(outcome, ExpandOutcome::LoadFailed(LoadError::new("timeout")));
    assert!(!grid.is_row_expand_by_row(&id("2")));
    assert!(!grid.is_row_expand_loaded(&id("2")));
    assert!(log.names().is_empty());
}

#[test]
fn test_row_detail_accordion_keeps_one_row() {
    let mut config = keyed_config();
    config.expand.accordion = true;
    let mut grid = Grid::new(config, vec![Column::new("name")]);
    grid.load_data(records(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]));

    block_on(grid.set_row_expand(&ids(&["1"]), true));
    let outcomes = block_on(grid.set_row_expand(&ids(&["2", "3"]), true));

    assert_eq!(outcomes.last(), Some(&(id("3"), ExpandOutcome::Expanded)));
    assert!(!grid.is_row_expand_by_row(&id("1")));
    assert!(!grid.is_row_expand_by_row(&id("2")));
    assert!(grid.is_row_expand_by_row(&id("3")));
    assert_eq!(grid.get_row_expand_records().len(), 1);
}

#[test]
fn test_toggle_hook_refuses_row_expand() {
    let hooks = GridHooks::new().with_toggle_method(|params| params.rowid.as_str() != "2");
    let mut grid = detail_grid(hooks);

    let outcomes = block_on(grid.set_row_expand(&ids(&["1", "2"]), true));

    assert!(outcomes.contains(&(id("2"), ExpandOutcome::Refused)));
    assert!(outcomes.contains(&(id("1"), ExpandOutcome::Expanded)));
    assert!(!grid.is_row_expand_by_row(&id("2")));
}

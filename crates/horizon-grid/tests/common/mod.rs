//! Shared fixtures for the grid integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use horizon_grid::prelude::*;

/// Route grid logs to the test output. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("horizon_grid=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Records from JSON objects. Non-objects are dropped.
pub fn records(values: Vec<Value>) -> Vec<Record> {
    values.into_iter().filter_map(record_from_value).collect()
}

pub fn ids(keys: &[&str]) -> Vec<RowId> {
    keys.iter().map(|key| RowId::from(*key)).collect()
}

pub fn id(key: &str) -> RowId {
    RowId::from(key)
}

/// Config whose rows are keyed by their `id` field.
pub fn keyed_config() -> GridConfig {
    let mut config = GridConfig::default();
    config.row.key_field = "id".into();
    config
}

/// Keyed grid over `count` rows `{id, name, age}` with ids `1..=count`.
pub fn numbered_grid(config: GridConfig, columns: Vec<Column>, count: u64) -> Grid {
    init_tracing();
    let mut grid = Grid::new(config, columns);
    let rows = (1..=count)
        .map(|i| serde_json::json!({ "id": i, "name": format!("row {i}"), "age": 20 + i % 7 }))
        .collect();
    grid.load_data(records(rows));
    grid
}

pub fn after_keys(grid: &Grid) -> Vec<String> {
    grid.after_data().iter().map(|id| id.to_string()).collect()
}

pub fn full_keys(grid: &Grid) -> Vec<String> {
    grid.full_data().iter().map(|id| id.to_string()).collect()
}

/// Records every event a grid dispatches.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GridEvent>>>,
}

impl EventLog {
    pub fn attach(grid: &Grid) -> Self {
        let log = Self::default();
        let sink = log.events.clone();
        grid.events().connect(move |event: &GridEvent| sink.lock().push(event.clone()));
        log
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(GridEvent::name).collect()
    }

    /// Names without scroll events.
    pub fn names_except_scroll(&self) -> Vec<&'static str> {
        self.names().into_iter().filter(|name| *name != "scroll").collect()
    }

    pub fn events(&self) -> Vec<GridEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

//! Row records and cell access.
//!
//! A row is an opaque JSON object. Cells are addressed by a dotted path
//! (`"address.city"`, `"tags.0"`) through a [`CellAccessor`], so the engine
//! never needs to know how the host shapes its data.

use serde_json::{Map, Value};

use crate::model::column::Column;

/// A single cell value.
pub type CellValue = Value;

/// One application row.
pub type Record = Map<String, Value>;

/// Build a record from a JSON value. Non-object values yield `None`.
pub fn record_from_value(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Read the value at a dotted path.
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write the value at a dotted path, creating intermediate objects.
///
/// A non-object intermediate value is replaced by an object. Numeric segments
/// index into existing arrays; out of range indices are ignored.
pub fn set_path(record: &mut Record, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        record.insert((*first).to_string(), value);
        return;
    }
    let slot = record
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    set_in(slot, rest, value);
}

fn set_in(target: &mut Value, segments: &[&str], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Some(item) = segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            set_in(item, rest, value);
        }
        return;
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let child = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        set_in(child, rest, value);
    }
}

/// Whether a value counts as "no value" for identity and key lookups.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Loose truthiness, as used for flag fields such as "has children".
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Formatted text of a cell, as used for default sort keys and filter labels.
pub fn cell_label(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Reads and writes cell values on behalf of the engine.
pub trait CellAccessor: Send + Sync {
    /// Value of `column` in `row`. Missing values read as `Null`.
    fn get_cell_value(&self, row: &Record, column: &Column) -> CellValue;

    /// Store `value` as the cell of `column` in `row`.
    fn set_cell_value(&self, row: &mut Record, column: &Column, value: CellValue);
}

/// Default accessor: resolves the column's `field` as a dotted path.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathAccessor;

impl CellAccessor for PathAccessor {
    fn get_cell_value(&self, row: &Record, column: &Column) -> CellValue {
        column
            .field
            .as_deref()
            .and_then(|field| get_path(row, field))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn set_cell_value(&self, row: &mut Record, column: &Column, value: CellValue) {
        if let Some(field) = column.field.as_deref() {
            set_path(row, field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        record_from_value(value).unwrap()
    }

    #[test]
    fn test_get_nested_path() {
        let row = record(json!({"a": {"b": [10, {"c": "x"}]}}));
        assert_eq!(get_path(&row, "a.b.0"), Some(&json!(10)));
        assert_eq!(get_path(&row, "a.b.1.c"), Some(&json!("x")));
        assert_eq!(get_path(&row, "a.z"), None);
        assert_eq!(get_path(&row, "a.b.9"), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut row = Record::new();
        set_path(&mut row, "address.city", json!("Oslo"));
        assert_eq!(Value::Object(row.clone()), json!({"address": {"city": "Oslo"}}));

        set_path(&mut row, "address", json!(3));
        set_path(&mut row, "address.zip", json!("0150"));
        assert_eq!(get_path(&row, "address.zip"), Some(&json!("0150")));
    }

    #[test]
    fn test_set_into_array() {
        let mut row = record(json!({"tags": ["a", "b"]}));
        set_path(&mut row, "tags.1", json!("z"));
        set_path(&mut row, "tags.5", json!("ignored"));
        assert_eq!(get_path(&row, "tags"), Some(&json!(["a", "z"])));
    }

    #[test]
    fn test_blank_and_label() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!(""))));
        assert!(is_blank(Some(&Value::Null)));
        assert!(!is_blank(Some(&json!(0))));

        assert_eq!(cell_label(&json!(null)), "");
        assert_eq!(cell_label(&json!(12.5)), "12.5");
        assert_eq!(cell_label(&json!("abc")), "abc");
        assert_eq!(cell_label(&json!(true)), "true");
    }

    #[test]
    fn test_path_accessor() {
        let column = Column::new("info.age");
        let mut row = record(json!({"info": {"age": 31}}));
        assert_eq!(PathAccessor.get_cell_value(&row, &column), json!(31));

        PathAccessor.set_cell_value(&mut row, &column, json!(32));
        assert_eq!(get_path(&row, "info.age"), Some(&json!(32)));

        let unbound = Column::untitled();
        assert_eq!(PathAccessor.get_cell_value(&row, &unbound), Value::Null);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!(1))));
        assert!(is_truthy(Some(&json!("y"))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(None));
    }
}

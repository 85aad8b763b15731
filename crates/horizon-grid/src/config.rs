//! Grid configuration.
//!
//! Every option has a default, so an empty document is a valid configuration.
//! Configurations can be built in code or loaded from TOML / JSON:
//!
//! ```ignore
//! use horizon_grid::GridConfig;
//!
//! let config = GridConfig::from_toml_str(r#"
//!     keep_source = true
//!
//!     [tree]
//!     transform = true
//!     parent_field = "pid"
//!
//!     [edit]
//!     mode = "row"
//! "#)?;
//! ```
//!
//! Semantic problems (e.g. an empty tree parent field) are not parse errors.
//! [`GridConfig::diagnose`] lists them and the grid logs each one and runs in
//! a degraded mode.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigParseError, Result};
use crate::model::merge::MergeSpec;
use crate::model::pipeline::SortOrder;
use crate::view::edit::{EditMode, EditTrigger};

/// Field used to store generated row ids when no key field is configured.
pub const DEFAULT_ROW_KEY: &str = "_X_ROW_KEY";

/// Top-level grid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub row: RowConfig,
    /// Keep a pristine copy of loaded rows for revert and update detection.
    pub keep_source: bool,
    /// Tree mode; `None` means flat data.
    pub tree: Option<TreeConfig>,
    pub sort: SortConfig,
    pub filter: FilterConfig,
    /// Editing; `None` means editing is off.
    pub edit: Option<EditConfig>,
    pub scroll_x: ScrollConfig,
    pub scroll_y: ScrollConfig,
    pub mouse: MouseConfig,
    pub checkbox: CheckboxConfig,
    pub expand: RowExpandConfig,
    /// Spans applied after every full load.
    pub merge_cells: Vec<MergeSpec>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row: RowConfig::default(),
            keep_source: false,
            tree: None,
            sort: SortConfig::default(),
            filter: FilterConfig::default(),
            edit: None,
            scroll_x: ScrollConfig::horizontal(),
            scroll_y: ScrollConfig::vertical(),
            mouse: MouseConfig::default(),
            checkbox: CheckboxConfig::default(),
            expand: RowExpandConfig::default(),
            merge_cells: Vec::new(),
        }
    }
}

impl GridConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigParseError::Toml(e).into())
    }

    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ConfigParseError::Json(e).into())
    }

    /// Enable tree mode.
    pub fn with_tree(mut self, tree: TreeConfig) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Enable editing.
    pub fn with_edit(mut self, mode: EditMode) -> Self {
        self.edit = Some(EditConfig {
            mode,
            ..EditConfig::default()
        });
        self
    }

    /// Edit mode, if editing is enabled.
    pub fn edit_mode(&self) -> Option<EditMode> {
        self.edit.as_ref().map(|e| e.mode)
    }

    /// Whether tree data is reassembled from flat parent/child keys.
    pub fn is_tree_transform(&self) -> bool {
        self.tree.as_ref().is_some_and(|t| t.transform)
    }

    /// Semantic problems with this configuration, one message per problem.
    pub fn diagnose(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.row.key_field.trim().is_empty() {
            issues.push(format!(
                "row.key_field is empty; falling back to '{DEFAULT_ROW_KEY}'"
            ));
        }
        if let Some(tree) = &self.tree {
            if tree.children_field.is_empty() {
                issues.push("tree.children_field is empty".to_string());
            }
            if tree.transform {
                if tree.row_field.is_empty() || tree.parent_field.is_empty() {
                    issues.push(
                        "tree.transform requires tree.row_field and tree.parent_field".to_string(),
                    );
                }
                if tree.map_children_field.is_empty() {
                    issues.push("tree.transform requires tree.map_children_field".to_string());
                }
            }
            if tree.lazy && tree.has_child_field.is_empty() {
                issues.push("tree.lazy requires tree.has_child_field".to_string());
            }
        }
        if self.expand.accordion && self.expand.expand_all {
            issues.push("expand.accordion ignores expand.expand_all".to_string());
        }
        issues
    }
}

/// Row identity options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowConfig {
    /// Dotted path of the row key. Rows with a blank key get a generated id
    /// written back to this path.
    pub key_field: String,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_ROW_KEY.to_string(),
        }
    }
}

/// How unresolved parent keys are reported in transform mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedParent {
    #[default]
    Warn,
    Error,
}

/// Tree mode options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Build the tree from flat records by key matching.
    pub transform: bool,
    pub row_field: String,
    pub parent_field: String,
    pub children_field: String,
    /// Field that receives the reassembled children in transform mode.
    pub map_children_field: String,
    /// Field flagging a lazily loadable node.
    pub has_child_field: String,
    pub lazy: bool,
    /// Only one expanded node per sibling group.
    pub accordion: bool,
    pub expand_all: bool,
    pub expand_row_keys: Vec<String>,
    pub unresolved_parent: UnresolvedParent,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            transform: false,
            row_field: "id".to_string(),
            parent_field: "parentId".to_string(),
            children_field: "children".to_string(),
            map_children_field: "_X_ROW_CHILD".to_string(),
            has_child_field: "hasChild".to_string(),
            lazy: false,
            accordion: false,
            expand_all: false,
            expand_row_keys: Vec::new(),
            unresolved_parent: UnresolvedParent::Warn,
        }
    }
}

impl TreeConfig {
    /// Transform-mode tree with the given key fields.
    pub fn transform(row_field: impl Into<String>, parent_field: impl Into<String>) -> Self {
        Self {
            transform: true,
            row_field: row_field.into(),
            parent_field: parent_field.into(),
            ..Self::default()
        }
    }

    /// Nested-mode tree reading children from `children_field`.
    pub fn nested(children_field: impl Into<String>) -> Self {
        Self {
            children_field: children_field.into(),
            ..Self::default()
        }
    }
}

/// A sort applied on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDefault {
    pub field: String,
    pub order: SortOrder,
}

/// Sort options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Allow more than one sorted column.
    pub multiple: bool,
    /// With `multiple`, sort columns apply in the order they were toggled.
    pub chronological: bool,
    /// Sorting happens in an external data source.
    pub remote: bool,
    pub default_sort: Vec<SortDefault>,
}

/// Filter options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Filtering happens in an external data source.
    pub remote: bool,
}

/// Edit options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub mode: EditMode,
    pub trigger: EditTrigger,
}

/// Virtual scrolling options for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub enabled: bool,
    /// Windowing activates once the axis has more items than this.
    pub gt: usize,
    /// Extra items rendered past each viewport edge.
    pub o_size: usize,
}

impl ScrollConfig {
    /// Row axis defaults.
    pub fn vertical() -> Self {
        Self {
            enabled: true,
            gt: 100,
            o_size: 0,
        }
    }

    /// Column axis defaults.
    pub fn horizontal() -> Self {
        Self {
            enabled: true,
            gt: 60,
            o_size: 0,
        }
    }

    /// Windowing with the given threshold.
    pub fn threshold(gt: usize) -> Self {
        Self {
            enabled: true,
            gt,
            o_size: 0,
        }
    }

    /// Windowing switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::vertical()
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self::vertical()
    }
}

/// Mouse interaction options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouseConfig {
    /// Clicking a cell selects it.
    pub selected: bool,
}

/// Checkbox selection options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckboxConfig {
    /// Mirror the checked state into this record field.
    pub check_field: Option<String>,
    /// Parents and children are checked independently.
    pub check_strictly: bool,
    /// Check every row on load.
    pub check_all: bool,
    pub check_row_keys: Vec<String>,
}

/// Row detail expansion options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowExpandConfig {
    /// Expanding calls the row detail loader first.
    pub lazy: bool,
    /// Only one expanded row at a time.
    pub accordion: bool,
    pub expand_all: bool,
    pub expand_row_keys: Vec<String>,
}

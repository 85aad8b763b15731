//! Callbacks the grid consumes from its host.
//!
//! Predicates (`before_edit`, `toggle_method`, `check_method`) are plain
//! synchronous functions. Lazy loads and validation return boxed futures;
//! the grid awaits them inside its async operations and never spawns them.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::{LoadError, ValidationError};
use crate::model::column::{Column, ColumnId};
use crate::model::pipeline::{ColumnFilterParams, GlobalFilterFn, SortMethodFn, SortParams};
use crate::model::row_cache::RowId;
use crate::record::{CellAccessor, PathAccessor, Record};
use crate::view::edit::CellPos;

/// Asks the host to repaint. Called after every state change.
pub trait RenderNotifier: Send + Sync {
    fn schedule_render(&self);
}

/// Notifier for hosts that poll state instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl RenderNotifier for NoopNotifier {
    fn schedule_render(&self) {}
}

/// Moves input focus into a freshly activated cell.
pub trait FocusHook: Send + Sync {
    fn focus_cell(&self, cell: &CellPos);
}

/// When validation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatePhase {
    /// The active cell is about to lose the edit.
    Blur,
    /// An explicit commit.
    Commit,
}

/// What is being validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateTarget {
    pub row: RowId,
    pub record: Record,
    pub column: Option<ColumnId>,
    pub field: Option<String>,
}

/// External validation.
pub trait Validator: Send + Sync {
    fn trigger_validate(
        &self,
        phase: ValidatePhase,
        target: ValidateTarget,
    ) -> BoxFuture<'static, Result<(), ValidationError>>;

    /// Drop any validation messages currently shown.
    fn clear_validate(&self) {}
}

/// Which expansion a toggle check is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandKind {
    Tree,
    Row,
}

pub struct ToggleParams<'a> {
    pub kind: ExpandKind,
    pub rowid: &'a RowId,
    pub row: &'a Record,
    pub expanded: bool,
}

pub type BeforeEditFn = Arc<dyn Fn(&Record, &Column) -> bool + Send + Sync>;
pub type ToggleMethodFn = Arc<dyn Fn(&ToggleParams<'_>) -> bool + Send + Sync>;
pub type CheckMethodFn = Arc<dyn Fn(&Record) -> bool + Send + Sync>;
pub type LoadChildrenFn =
    Arc<dyn Fn(&Record) -> BoxFuture<'static, Result<Vec<Record>, LoadError>> + Send + Sync>;
pub type LoadRowDetailFn =
    Arc<dyn Fn(&Record) -> BoxFuture<'static, Result<(), LoadError>> + Send + Sync>;

/// All host callbacks of one grid.
#[derive(Clone)]
pub struct GridHooks {
    pub accessor: Arc<dyn CellAccessor>,
    pub notifier: Arc<dyn RenderNotifier>,
    pub before_edit: Option<BeforeEditFn>,
    pub toggle_method: Option<ToggleMethodFn>,
    pub check_method: Option<CheckMethodFn>,
    pub filter_method: Option<GlobalFilterFn>,
    pub sort_method: Option<SortMethodFn>,
    pub load_children: Option<LoadChildrenFn>,
    pub load_row_detail: Option<LoadRowDetailFn>,
    pub validator: Option<Arc<dyn Validator>>,
    pub focus: Option<Arc<dyn FocusHook>>,
}

impl Default for GridHooks {
    fn default() -> Self {
        Self {
            accessor: Arc::new(PathAccessor),
            notifier: Arc::new(NoopNotifier),
            before_edit: None,
            toggle_method: None,
            check_method: None,
            filter_method: None,
            sort_method: None,
            load_children: None,
            load_row_detail: None,
            validator: None,
            focus: None,
        }
    }
}

impl GridHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accessor(mut self, accessor: impl CellAccessor + 'static) -> Self {
        self.accessor = Arc::new(accessor);
        self
    }

    pub fn with_notifier(mut self, notifier: impl RenderNotifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_before_edit<F>(mut self, method: F) -> Self
    where
        F: Fn(&Record, &Column) -> bool + Send + Sync + 'static,
    {
        self.before_edit = Some(Arc::new(method));
        self
    }

    pub fn with_toggle_method<F>(mut self, method: F) -> Self
    where
        F: Fn(&ToggleParams<'_>) -> bool + Send + Sync + 'static,
    {
        self.toggle_method = Some(Arc::new(method));
        self
    }

    pub fn with_check_method<F>(mut self, method: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.check_method = Some(Arc::new(method));
        self
    }

    /// Filter for columns without their own method. It sees every checked
    /// option of the column at once.
    pub fn with_filter_method<F>(mut self, method: F) -> Self
    where
        F: Fn(&ColumnFilterParams<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter_method = Some(Arc::new(method));
        self
    }

    /// Replace the built-in sort. Called with the after rows (each sibling
    /// group in tree mode) whenever a column is sorted.
    pub fn with_sort_method<F>(mut self, method: F) -> Self
    where
        F: Fn(&SortParams<'_>) -> Vec<RowId> + Send + Sync + 'static,
    {
        self.sort_method = Some(Arc::new(method));
        self
    }

    pub fn with_load_children<F>(mut self, method: F) -> Self
    where
        F: Fn(&Record) -> BoxFuture<'static, Result<Vec<Record>, LoadError>> + Send + Sync + 'static,
    {
        self.load_children = Some(Arc::new(method));
        self
    }

    pub fn with_load_row_detail<F>(mut self, method: F) -> Self
    where
        F: Fn(&Record) -> BoxFuture<'static, Result<(), LoadError>> + Send + Sync + 'static,
    {
        self.load_row_detail = Some(Arc::new(method));
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_focus(mut self, focus: impl FocusHook + 'static) -> Self {
        self.focus = Some(Arc::new(focus));
        self
    }
}

impl fmt::Debug for GridHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridHooks")
            .field("before_edit", &self.before_edit.is_some())
            .field("toggle_method", &self.toggle_method.is_some())
            .field("check_method", &self.check_method.is_some())
            .field("filter_method", &self.filter_method.is_some())
            .field("sort_method", &self.sort_method.is_some())
            .field("load_children", &self.load_children.is_some())
            .field("load_row_detail", &self.load_row_detail.is_some())
            .field("validator", &self.validator.is_some())
            .field("focus", &self.focus.is_some())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(GridHooks: Send, Sync, Clone);

//! Error types for the grid engine.
//!
//! Structural misuse (bad configuration, unknown references, tree operations
//! outside tree mode) is returned as [`GridError`]. Operational failures that
//! the grid recovers from on its own, lazy loads and validation, have their
//! own value types and travel inside operation outcomes instead.

use std::fmt;

use crate::model::row_cache::RowId;

/// Result type alias for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors returned by grid operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// Configuration is missing or inconsistent.
    #[error("Invalid grid configuration: {message}")]
    Config { message: String },

    /// A configuration document could not be parsed.
    #[error("Failed to parse grid configuration: {0}")]
    ConfigParse(#[from] ConfigParseError),

    /// A row reference did not resolve against the current dataset.
    #[error("Row '{rowid}' is not part of the dataset")]
    RowNotFound { rowid: RowId },

    /// A column reference did not resolve against the registry.
    #[error("Column '{column}' is not registered")]
    ColumnNotFound { column: String },

    /// A tree operation was called while tree mode is off.
    #[error("'{operation}' requires tree mode")]
    TreeModeRequired { operation: &'static str },

    /// The operation cannot run in the current tree mode.
    #[error("'{operation}' is not supported for nested tree data")]
    TreeModeUnsupported { operation: &'static str },

    /// A merge span was rejected.
    #[error("Invalid merge span: {reason}")]
    InvalidMerge { reason: String },
}

impl GridError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a row-not-found error.
    pub fn row_not_found(rowid: &RowId) -> Self {
        Self::RowNotFound {
            rowid: rowid.clone(),
        }
    }

    /// Create a column-not-found error.
    pub fn column_not_found(column: impl fmt::Display) -> Self {
        Self::ColumnNotFound {
            column: column.to_string(),
        }
    }

    /// Create a merge rejection.
    pub fn invalid_merge(reason: impl Into<String>) -> Self {
        Self::InvalidMerge {
            reason: reason.into(),
        }
    }
}

/// Parse failures for TOML and JSON configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigParseError {
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A lazy-load callback failed.
///
/// Never returned from an expand operation; the node is left collapsed and
/// the failure is reported in the operation's outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Lazy load failed: {message}")]
pub struct LoadError {
    pub message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A validator rejected the cell being committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation rule '{rule}' failed on row '{row}': {message}")]
pub struct ValidationError {
    /// Name of the failing rule.
    pub rule: String,
    /// Row holding the invalid value.
    pub row: RowId,
    /// Field of the column holding the invalid value, if the rule is cell scoped.
    pub column: Option<String>,
    /// Human readable message.
    pub message: String,
}

impl ValidationError {
    pub fn new(
        rule: impl Into<String>,
        row: RowId,
        column: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            row,
            column,
            message: message.into(),
        }
    }
}

//! Error taxonomy shared by the spec model and both pivot engines.
//!
//! Every variant is raised while validating inputs, before any output rows
//! exist, so a failed pivot never hands back a partial table.

use thiserror::Error;

use crate::schema::ColumnType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PivotError {
    #[error("Column '{column}' not found{}", describe_context(.context))]
    ColumnNotFound { column: String, context: String },

    #[error("Column selection matched no columns{}", describe_context(.context))]
    EmptySelection { context: String },

    #[error("Ambiguous pivot spec: {reason}")]
    AmbiguousSpec { reason: String },

    #[error("Duplicate output column '{column}'{}", describe_context(.context))]
    DuplicateOutputColumn { column: String, context: String },

    #[error(
        "Values in '{value_column}' are not uniquely identified: {count} input rows map to output column '{column}' for id row {group}"
    )]
    ValueConflict {
        column: String,
        value_column: String,
        group: usize,
        count: usize,
    },

    #[error("Column '{column}' cannot combine {left} with {right}")]
    IncompatibleTypes {
        column: String,
        left: ColumnType,
        right: ColumnType,
    },

    #[error("Invalid pivot spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Malformed table: {0}")]
    TableShape(String),
}

fn describe_context(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" ({context})")
    }
}

impl PivotError {
    pub fn column_not_found(column: impl Into<String>, context: impl Into<String>) -> Self {
        PivotError::ColumnNotFound {
            column: column.into(),
            context: context.into(),
        }
    }

    pub fn duplicate_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        PivotError::DuplicateOutputColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    pub fn ambiguous(reason: impl Into<String>) -> Self {
        PivotError::AmbiguousSpec {
            reason: reason.into(),
        }
    }
}

pub type PivotResult<T> = std::result::Result<T, PivotError>;

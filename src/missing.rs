//! Missing-value policy shared by the pivot engines.
//!
//! The long engine can drop rows whose value columns are all missing. The
//! wide engine fills cells that are absent because no input row supplied
//! them; cells that were recorded as missing in the input stay missing.

use std::collections::HashMap;

use crate::{
    data::Value,
    error::{PivotError, PivotResult},
    frame::{Cell, Column},
    schema::ColumnType,
};

/// A wide-form cell before fill is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// No input row matched this id row and output column.
    Absent,
    /// An input row matched; its cell may itself be missing.
    Recorded(Cell),
}

/// Fill literals for structurally absent wide cells, keyed by value variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuesFill {
    default: Option<Value>,
    by_value: HashMap<String, Value>,
}

impl ValuesFill {
    pub fn none() -> Self {
        Self::default()
    }

    /// Uses `value` for every value variable without its own fill.
    pub fn all(value: impl Into<Value>) -> Self {
        Self {
            default: Some(value.into()),
            by_value: HashMap::new(),
        }
    }

    /// Sets the fill used by value variables without their own entry.
    pub fn with_default(mut self, fill: impl Into<Value>) -> Self {
        self.default = Some(fill.into());
        self
    }

    pub fn with(mut self, value_name: impl Into<String>, fill: impl Into<Value>) -> Self {
        self.by_value.insert(value_name.into(), fill.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_value.is_empty()
    }

    pub fn for_value(&self, value_name: &str) -> Option<&Value> {
        self.by_value.get(value_name).or(self.default.as_ref())
    }

    pub fn value_names(&self) -> impl Iterator<Item = &str> {
        self.by_value.keys().map(String::as_str)
    }
}

/// Resolves slots into cells, filling absent ones with `fill` converted to
/// the column's type.
pub fn fill_slots(
    column: &str,
    data_type: ColumnType,
    slots: Vec<Slot>,
    fill: Option<&Value>,
) -> PivotResult<Vec<Cell>> {
    let fill = match fill {
        Some(value) => Some(value.clone().coerce(&data_type).ok_or_else(|| {
            PivotError::IncompatibleTypes {
                column: column.to_string(),
                left: data_type,
                right: value.column_type(),
            }
        })?),
        None => None,
    };
    Ok(slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Absent => fill.clone(),
            Slot::Recorded(cell) => cell,
        })
        .collect())
}

/// Row indices that keep at least one present value across `value_columns`.
pub fn rows_with_values(value_columns: &[&Column], row_count: usize) -> Vec<usize> {
    (0..row_count)
        .filter(|&row| value_columns.iter().any(|c| c.values[row].is_some()))
        .collect()
}

/// Keeps only the listed rows, in the given order, in every column.
pub fn retain_rows(columns: Vec<Column>, rows: &[usize]) -> Vec<Column> {
    columns
        .into_iter()
        .map(|column| {
            let values = rows.iter().map(|&r| column.values[r].clone()).collect();
            Column::new(column.name, column.data_type, values)
        })
        .collect()
}

//! In-memory column store consumed and produced by the pivot engines.
//!
//! A [`Table`] is an ordered list of named, typed [`Column`]s of equal
//! length. It carries just enough relational surface for reshaping: lookup
//! by name, schema complements, row access, and construction from columns or
//! raw text rows.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, parse_typed_value},
    error::{PivotError, PivotResult},
    schema::{ColumnType, infer_column_type},
};

pub type Cell = Option<Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: ColumnType, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Builds a column whose type is taken from its first present value.
    pub fn from_values<V: Into<Value>>(name: impl Into<String>, values: Vec<Option<V>>) -> Self {
        let values = values
            .into_iter()
            .map(|value| value.map(Into::into))
            .collect::<Vec<Cell>>();
        let data_type = values
            .iter()
            .flatten()
            .next()
            .map(Value::column_type)
            .unwrap_or_default();
        Self::new(name, data_type, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row).and_then(|v| v.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> PivotResult<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PivotError::duplicate_column(&column.name, "table columns"));
            }
            if column.len() != rows {
                return Err(PivotError::TableShape(format!(
                    "column '{}' has {} value(s) but '{}' has {}",
                    column.name,
                    column.len(),
                    columns[0].name,
                    rows
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Builds a typed table from text rows, inferring each column's type.
    pub fn from_text_rows(headers: &[String], rows: &[Vec<String>]) -> Result<Self> {
        let mut columns = Vec::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let raw = rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect::<Vec<_>>();
            let data_type = infer_column_type(raw.iter().copied(), 0);
            let values = raw
                .iter()
                .enumerate()
                .map(|(row_idx, cell)| {
                    parse_typed_value(cell, &data_type)
                        .with_context(|| format!("Column '{header}', row {}", row_idx + 1))
                })
                .collect::<Result<Vec<_>>>()?;
            columns.push(Column::new(header.clone(), data_type, values));
        }
        let mut table = Table::new(columns)?;
        if headers.is_empty() {
            table.rows = rows.len();
        }
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require(&self, name: &str, context: &str) -> PivotResult<&Column> {
        self.column(name)
            .ok_or_else(|| PivotError::column_not_found(name, context))
    }

    /// Names of every column not in `names`, in table order.
    pub fn complement<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let excluded = names.iter().map(|n| n.as_ref()).collect::<HashSet<_>>();
        self.columns
            .iter()
            .filter(|c| !excluded.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn row(&self, idx: usize) -> Option<Vec<Cell>> {
        if idx >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values[idx].clone()).collect())
    }

    pub fn text_rows(&self) -> Vec<Vec<String>> {
        (0..self.rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| crate::data::display_cell(c.get(row)))
                    .collect()
            })
            .collect()
    }
}

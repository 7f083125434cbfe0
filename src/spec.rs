//! The pivot specification: which wide column holds which long variable.
//!
//! A [`PivotSpec`] has one row per wide column. Each row carries the wide
//! column's literal name (`.name`), the value variable its cells belong to
//! (`.value`), and one entry per key column describing where the column sits
//! along each variable encoded in wide column names. A missing key entry
//! means the wide column does not vary along that key.
//!
//! Specs are built by [`crate::infer`] or by hand through [`SpecBuilder`],
//! and can be reshaped with the editing methods here (splitting a key into
//! several, retyping, stripping prefixes) before they are handed to
//! [`crate::longer`] or [`crate::wider`]. A spec converts losslessly to and
//! from a [`Table`] with reserved `.name` and `.value` columns.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, display_cell, parse_typed_value},
    error::{PivotError, PivotResult},
    frame::{Cell, Column, Table},
    schema::ColumnType,
};

pub const NAME_COLUMN: &str = ".name";
pub const VALUE_COLUMN: &str = ".value";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub data_type: ColumnType,
    pub values: Vec<Cell>,
}

impl KeyColumn {
    pub fn new(name: impl Into<String>, data_type: ColumnType, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Key column of text values; convenient for names taken from headers.
    pub fn text<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| Some(Value::String(v.into())))
            .collect();
        Self::new(name, ColumnType::String, values)
    }

    fn into_column(self) -> Column {
        Column::new(self.name, self.data_type, self.values)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PivotSpec {
    names: Vec<String>,
    values: Vec<String>,
    keys: Vec<KeyColumn>,
}

impl PivotSpec {
    pub fn new(names: Vec<String>, values: Vec<String>, keys: Vec<KeyColumn>) -> PivotResult<Self> {
        let spec = Self {
            names,
            values,
            keys,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Assembles a spec without validating it. Engines validate before use.
    pub fn from_parts(names: Vec<String>, values: Vec<String>, keys: Vec<KeyColumn>) -> Self {
        Self {
            names,
            values,
            keys,
        }
    }

    pub fn builder() -> SpecBuilder {
        SpecBuilder::default()
    }

    pub fn validate(&self) -> PivotResult<()> {
        let rows = self.names.len();
        if self.values.len() != rows {
            return Err(PivotError::InvalidSpec(format!(
                "`.name` has {rows} row(s) but `.value` has {}",
                self.values.len()
            )));
        }
        let mut key_names = HashSet::new();
        for key in &self.keys {
            if key.name == NAME_COLUMN || key.name == VALUE_COLUMN {
                return Err(PivotError::InvalidSpec(format!(
                    "key column cannot use reserved name '{}'",
                    key.name
                )));
            }
            if !key_names.insert(key.name.as_str()) {
                return Err(PivotError::InvalidSpec(format!(
                    "key column '{}' appears more than once",
                    key.name
                )));
            }
            if key.values.len() != rows {
                return Err(PivotError::InvalidSpec(format!(
                    "key column '{}' has {} value(s) but the spec has {rows} row(s)",
                    key.name,
                    key.values.len()
                )));
            }
        }

        let mut seen_names = HashSet::new();
        for (row, name) in self.names.iter().enumerate() {
            if name.is_empty() {
                return Err(PivotError::InvalidSpec(format!(
                    "`.name` is empty in spec row {}",
                    row + 1
                )));
            }
            if !seen_names.insert(name.as_str()) {
                return Err(PivotError::duplicate_column(
                    name,
                    format!("spec `.name` row {}", row + 1),
                ));
            }
        }
        if let Some(row) = self.values.iter().position(|v| v.is_empty()) {
            return Err(PivotError::InvalidSpec(format!(
                "`.value` is empty in spec row {} ('{}')",
                row + 1,
                self.names[row]
            )));
        }

        if self.keys.is_empty() && rows > 1 {
            return Err(PivotError::ambiguous(format!(
                "{rows} rows but no key columns to tell them apart"
            )));
        }
        let mut combinations: HashMap<(Vec<Cell>, &str), usize> = HashMap::new();
        for row in 0..rows {
            let combination = (self.key_tuple(row), self.values[row].as_str());
            if let Some(first) = combinations.insert(combination, row) {
                return Err(PivotError::ambiguous(format!(
                    "rows '{}' and '{}' share the same keys and `.value` '{}'",
                    self.names[first], self.names[row], self.values[row]
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn keys(&self) -> &[KeyColumn] {
        &self.keys
    }

    pub fn key(&self, name: &str) -> Option<&KeyColumn> {
        self.keys.iter().find(|k| k.name == name)
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.name.as_str()).collect()
    }

    /// Distinct `.value` names in first-seen order.
    pub fn distinct_values(&self) -> Vec<&str> {
        self.values.iter().map(String::as_str).unique().collect()
    }

    pub fn key_tuple(&self, row: usize) -> Vec<Cell> {
        self.keys.iter().map(|k| k.values[row].clone()).collect()
    }

    /// Spec rows grouped by key tuple, groups and members in first-seen order.
    pub fn key_groups(&self) -> Vec<(Vec<Cell>, Vec<usize>)> {
        let mut positions: HashMap<Vec<Cell>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Cell>, Vec<usize>)> = Vec::new();
        for row in 0..self.len() {
            let tuple = self.key_tuple(row);
            match positions.get(&tuple) {
                Some(&idx) => groups[idx].1.push(row),
                None => {
                    positions.insert(tuple.clone(), groups.len());
                    groups.push((tuple, vec![row]));
                }
            }
        }
        groups
    }

    /// The spec as a table: `.name`, `.value`, then one column per key.
    pub fn to_table(&self) -> PivotResult<Table> {
        let mut columns = vec![
            Column::new(
                NAME_COLUMN,
                ColumnType::String,
                self.names.iter().map(|n| Some(Value::from(n.as_str()))).collect(),
            ),
            Column::new(
                VALUE_COLUMN,
                ColumnType::String,
                self.values.iter().map(|v| Some(Value::from(v.as_str()))).collect(),
            ),
        ];
        columns.extend(self.keys.iter().cloned().map(KeyColumn::into_column));
        Table::new(columns)
    }

    pub fn from_table(table: &Table) -> PivotResult<Self> {
        let names = reserved_column(table, NAME_COLUMN)?;
        let values = reserved_column(table, VALUE_COLUMN)?;
        let keys = table
            .columns()
            .iter()
            .filter(|c| c.name != NAME_COLUMN && c.name != VALUE_COLUMN)
            .map(|c| KeyColumn::new(c.name.clone(), c.data_type, c.values.clone()))
            .collect();
        Self::new(names, values, keys)
    }

    /// Sets `.value` to `value` on every row.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.values = vec![value; self.names.len()];
        self
    }

    pub fn add_key(mut self, key: KeyColumn) -> PivotResult<Self> {
        if key.values.len() != self.len() {
            return Err(PivotError::InvalidSpec(format!(
                "key column '{}' has {} value(s) but the spec has {} row(s)",
                key.name,
                key.values.len(),
                self.len()
            )));
        }
        self.keys.push(key);
        Ok(self)
    }

    pub fn drop_key(mut self, key: &str) -> PivotResult<Self> {
        let idx = self.key_index(key)?;
        self.keys.remove(idx);
        Ok(self)
    }

    pub fn rename_key(mut self, key: &str, new_name: impl Into<String>) -> PivotResult<Self> {
        let idx = self.key_index(key)?;
        self.keys[idx].name = new_name.into();
        Ok(self)
    }

    pub fn filter_rows<F>(self, keep: F) -> Self
    where
        F: Fn(&str, &str, &[Cell]) -> bool,
    {
        let kept = (0..self.len())
            .filter(|&row| keep(&self.names[row], &self.values[row], &self.key_tuple(row)))
            .collect::<Vec<_>>();
        Self {
            names: kept.iter().map(|&r| self.names[r].clone()).collect(),
            values: kept.iter().map(|&r| self.values[r].clone()).collect(),
            keys: self
                .keys
                .iter()
                .map(|k| {
                    KeyColumn::new(
                        k.name.clone(),
                        k.data_type,
                        kept.iter().map(|&r| k.values[r].clone()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Removes `prefix` from the front of every value of `key` that has it.
    pub fn strip_key_prefix(mut self, key: &str, prefix: &str) -> PivotResult<Self> {
        let idx = self.key_index(key)?;
        for cell in self.keys[idx].values.iter_mut() {
            if let Some(Value::String(text)) = cell
                && let Some(stripped) = text.strip_prefix(prefix)
            {
                *text = stripped.to_string();
            }
        }
        Ok(self)
    }

    /// Re-parses every value of `key` as `data_type`.
    pub fn retype_key(mut self, key: &str, data_type: ColumnType) -> PivotResult<Self> {
        let idx = self.key_index(key)?;
        let column = &mut self.keys[idx];
        let mut retyped = Vec::with_capacity(column.values.len());
        for (row, cell) in column.values.iter().enumerate() {
            let text = display_cell(cell.as_ref());
            let parsed = parse_typed_value(&text, &data_type).map_err(|err| {
                PivotError::InvalidSpec(format!(
                    "key '{key}' row {} ('{}'): {err}",
                    row + 1,
                    self.names[row]
                ))
            })?;
            retyped.push(parsed);
        }
        column.values = retyped;
        column.data_type = data_type;
        Ok(self)
    }

    /// Splits `key` on a literal separator into the keys named by `into`.
    ///
    /// A target of `.value` routes that piece into the row's `.value`; an
    /// empty target discards the piece. Short rows are padded with missing
    /// pieces; rows with more pieces than targets are rejected.
    pub fn separate_key(self, key: &str, into: &[&str], sep: &str) -> PivotResult<Self> {
        if sep.is_empty() {
            return Err(PivotError::InvalidSpec(
                "separator must not be empty".to_string(),
            ));
        }
        self.split_key(key, into, |text| {
            Some(text.split(sep).map(str::to_string).collect())
        })
    }

    /// Splits `key` using the capture groups of `pattern`, one per target.
    /// Values the pattern does not match yield missing pieces.
    pub fn extract_key(self, key: &str, into: &[&str], pattern: &str) -> PivotResult<Self> {
        let re = Regex::new(pattern).map_err(|err| PivotError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        let groups = re.captures_len() - 1;
        if groups != into.len() {
            return Err(PivotError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!(
                    "{groups} capture group(s) for {} target column(s)",
                    into.len()
                ),
            });
        }
        self.split_key(key, into, |text| {
            re.captures(text).map(|caps| {
                (1..=groups)
                    .map(|i| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
        })
    }

    fn split_key<F>(mut self, key: &str, into: &[&str], split: F) -> PivotResult<Self>
    where
        F: Fn(&str) -> Option<Vec<String>>,
    {
        if into.is_empty() {
            return Err(PivotError::InvalidSpec(format!(
                "no target columns given for splitting key '{key}'"
            )));
        }
        let idx = self.key_index(key)?;
        let source = self.keys.remove(idx);
        let rows = self.len();
        let mut pieces_by_target: Vec<Vec<Cell>> = vec![Vec::with_capacity(rows); into.len()];

        for (row, cell) in source.values.iter().enumerate() {
            let pieces = match cell {
                Some(value) => split(&value.as_display()),
                None => None,
            }
            .unwrap_or_default();
            if pieces.len() > into.len() {
                return Err(PivotError::InvalidSpec(format!(
                    "'{}' splits into {} piece(s) but only {} target(s) were given",
                    display_cell(cell.as_ref()),
                    pieces.len(),
                    into.len()
                )));
            }
            for (target, slot) in pieces_by_target.iter_mut().enumerate() {
                let piece = pieces
                    .get(target)
                    .filter(|p| !p.is_empty())
                    .map(|p| Value::String(p.clone()));
                slot.push(piece);
            }
        }

        let mut inserted = Vec::new();
        for (target, cells) in into.iter().zip(pieces_by_target) {
            if target.is_empty() {
                continue;
            }
            if *target == VALUE_COLUMN {
                for (row, cell) in cells.into_iter().enumerate() {
                    match cell {
                        Some(value) => self.values[row] = value.as_display(),
                        None => {
                            return Err(PivotError::InvalidSpec(format!(
                                "no `.value` piece in '{}'",
                                self.names[row]
                            )));
                        }
                    }
                }
            } else {
                inserted.push(KeyColumn::new(*target, ColumnType::String, cells));
            }
        }
        debug!(
            "Split key '{key}' into [{}] ({} new key column(s))",
            into.join(", "),
            inserted.len()
        );
        for (offset, column) in inserted.into_iter().enumerate() {
            self.keys.insert(idx + offset, column);
        }
        Ok(self)
    }

    fn key_index(&self, key: &str) -> PivotResult<usize> {
        self.keys
            .iter()
            .position(|k| k.name == key)
            .ok_or_else(|| PivotError::column_not_found(key, "spec key columns"))
    }
}

fn reserved_column(table: &Table, name: &str) -> PivotResult<Vec<String>> {
    let column = table.require(name, "pivot spec table")?;
    column
        .values
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.as_ref().map(Value::as_display).ok_or_else(|| {
                PivotError::InvalidSpec(format!("`{name}` is missing in spec row {}", row + 1))
            })
        })
        .collect()
}

/// Incremental construction of a [`PivotSpec`].
#[derive(Debug, Default)]
pub struct SpecBuilder {
    names: Vec<String>,
    values: Vec<String>,
    keys: Vec<KeyColumn>,
}

impl SpecBuilder {
    pub fn row(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.names.push(name.into());
        self.values.push(value.into());
        self
    }

    pub fn key_column(
        mut self,
        name: impl Into<String>,
        data_type: ColumnType,
        values: Vec<Cell>,
    ) -> Self {
        self.keys.push(KeyColumn::new(name, data_type, values));
        self
    }

    pub fn key(mut self, key: KeyColumn) -> Self {
        self.keys.push(key);
        self
    }

    pub fn build(self) -> PivotResult<PivotSpec> {
        PivotSpec::new(self.names, self.values, self.keys)
    }
}

//! Long to wide: collapses rows into the spec's `.name` columns.
//!
//! Input rows are grouped by their id columns; each group becomes one output
//! row. A spec row picks, within a group, the input row whose key columns
//! equal the spec row's keys and reads its `.value` column. Duplicate matches
//! are never aggregated: they fail with [`PivotError::ValueConflict`] unless
//! the caller opts into keeping the first or last match.

use std::{borrow::Cow, collections::HashMap, fmt, str::FromStr};

use anyhow::anyhow;
use log::{debug, warn};

use crate::{
    data::{Value, parse_typed_value},
    error::{PivotError, PivotResult},
    frame::{Cell, Column, Table},
    infer::{WiderSpecOptions, build_wider_spec},
    missing::{Slot, ValuesFill, fill_slots},
    schema::ColumnType,
    spec::{KeyColumn, PivotSpec},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Error,
    First,
    Last,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            DuplicatePolicy::Error => "error",
            DuplicatePolicy::First => "first",
            DuplicatePolicy::Last => "last",
        };
        write!(f, "{token}")
    }
}

impl FromStr for DuplicatePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(DuplicatePolicy::Error),
            "first" => Ok(DuplicatePolicy::First),
            "last" => Ok(DuplicatePolicy::Last),
            other => Err(anyhow!(
                "Unknown duplicate policy '{other}'. Expected error, first, or last"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WiderOptions {
    /// Columns identifying an output row. Defaults to every column that is
    /// neither a spec key nor a `.value` source.
    pub id_cols: Option<Vec<String>>,
    pub values_fill: ValuesFill,
    pub duplicates: DuplicatePolicy,
}

impl WiderOptions {
    pub fn id_cols<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_cols = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn values_fill(mut self, fill: ValuesFill) -> Self {
        self.values_fill = fill;
        self
    }

    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }
}

/// Shorthand: infer the spec from `names_from`/`values_from`, then pivot.
pub fn pivot_wider_by<S: AsRef<str>>(
    table: &Table,
    names_from: &[S],
    values_from: &[S],
    spec_options: &WiderSpecOptions,
    options: &WiderOptions,
) -> PivotResult<Table> {
    let spec = build_wider_spec(table, names_from, values_from, spec_options)?;
    pivot_wider(table, &spec, options)
}

pub fn pivot_wider(table: &Table, spec: &PivotSpec, options: &WiderOptions) -> PivotResult<Table> {
    spec.validate()?;
    let key_columns = spec
        .keys()
        .iter()
        .map(|key| {
            let column = table.require(&key.name, "spec key column")?;
            key_cells(column, key)
        })
        .collect::<PivotResult<Vec<_>>>()?;
    let value_names = spec.distinct_values();
    let value_columns = value_names
        .iter()
        .map(|name| table.require(name, "spec `.value`").map(|c| (*name, c)))
        .collect::<PivotResult<HashMap<_, _>>>()?;

    let id_names = match &options.id_cols {
        Some(columns) => {
            for name in columns {
                table.require(name, "id columns")?;
            }
            columns.clone()
        }
        None => {
            let mut spent = spec.key_names();
            spent.extend(value_names.iter().copied());
            table.complement(&spent)
        }
    };
    if let Some(name) = spec.names().iter().find(|name| id_names.contains(name)) {
        return Err(PivotError::duplicate_column(
            name,
            "`.name` collides with an id column",
        ));
    }
    for fill_name in options.values_fill.value_names() {
        if !value_names.contains(&fill_name) {
            warn!("values_fill entry '{fill_name}' does not match any `.value` in the spec");
        }
    }
    let id_columns = id_names
        .iter()
        .map(|name| table.require(name, "id columns"))
        .collect::<PivotResult<Vec<_>>>()?;

    let mut group_of_row = Vec::with_capacity(table.row_count());
    let mut group_first_row = Vec::new();
    let mut group_index: HashMap<Vec<Cell>, usize> = HashMap::new();
    for row in 0..table.row_count() {
        let id_tuple = id_columns
            .iter()
            .map(|c| c.values[row].clone())
            .collect::<Vec<_>>();
        let next = group_first_row.len();
        let group = *group_index.entry(id_tuple).or_insert(next);
        if group == next {
            group_first_row.push(row);
        }
        group_of_row.push(group);
    }
    let groups = group_first_row.len();

    let mut spec_rows_by_keys: HashMap<Vec<Cell>, Vec<usize>> = HashMap::new();
    for row in 0..spec.len() {
        spec_rows_by_keys
            .entry(spec.key_tuple(row))
            .or_default()
            .push(row);
    }

    let mut slots = vec![vec![Slot::Absent; groups]; spec.len()];
    let mut matches = vec![vec![0usize; groups]; spec.len()];
    let mut unmatched = 0usize;
    for row in 0..table.row_count() {
        let key_tuple = key_columns
            .iter()
            .map(|cells| cells[row].clone())
            .collect::<Vec<_>>();
        let Some(spec_rows) = spec_rows_by_keys.get(&key_tuple) else {
            unmatched += 1;
            continue;
        };
        let group = group_of_row[row];
        for &spec_row in spec_rows {
            let source = value_columns[spec.values()[spec_row].as_str()];
            matches[spec_row][group] += 1;
            let keep_existing =
                matches[spec_row][group] > 1 && options.duplicates != DuplicatePolicy::Last;
            if !keep_existing {
                slots[spec_row][group] = Slot::Recorded(source.values[row].clone());
            }
        }
    }
    if unmatched > 0 {
        debug!("{unmatched} input row(s) matched no spec row and were ignored");
    }

    if options.duplicates == DuplicatePolicy::Error {
        for (spec_row, counts) in matches.iter().enumerate() {
            if let Some((group, &count)) = counts.iter().enumerate().find(|(_, c)| **c > 1) {
                return Err(PivotError::ValueConflict {
                    column: spec.names()[spec_row].clone(),
                    value_column: spec.values()[spec_row].clone(),
                    group: group + 1,
                    count,
                });
            }
        }
    } else {
        let duplicated = matches.iter().flatten().filter(|c| **c > 1).count();
        if duplicated > 0 {
            warn!(
                "{duplicated} cell(s) had several matching rows; kept the {} match",
                options.duplicates
            );
        }
    }

    let mut columns = Vec::with_capacity(id_columns.len() + spec.len());
    for id in &id_columns {
        let values = group_first_row
            .iter()
            .map(|&row| id.values[row].clone())
            .collect();
        columns.push(Column::new(id.name.clone(), id.data_type, values));
    }
    for (spec_row, column_slots) in slots.into_iter().enumerate() {
        let name = &spec.names()[spec_row];
        let value_name = spec.values()[spec_row].as_str();
        let data_type = value_columns[value_name].data_type;
        let fill = options.values_fill.for_value(value_name);
        let values = fill_slots(name, data_type, column_slots, fill)?;
        columns.push(Column::new(name.clone(), data_type, values));
    }
    debug!(
        "Pivoted {} row(s) into {} row(s) x {} column(s)",
        table.row_count(),
        groups,
        columns.len()
    );
    Table::new(columns)
}

/// Key cells of `column` in the spec key's type, so that a key read back
/// from text as a number still matches a spec that holds it as text.
fn key_cells<'a>(column: &'a Column, key: &KeyColumn) -> PivotResult<Cow<'a, [Cell]>> {
    if column.data_type == key.data_type {
        return Ok(Cow::Borrowed(&column.values));
    }
    debug!(
        "Converting key column '{}' from {} to {}",
        key.name, column.data_type, key.data_type
    );
    column
        .values
        .iter()
        .map(|cell| match cell {
            None => Ok(None),
            Some(value) => convert_key(value, key.data_type).map(Some).ok_or_else(|| {
                PivotError::IncompatibleTypes {
                    column: key.name.clone(),
                    left: key.data_type,
                    right: column.data_type,
                }
            }),
        })
        .collect::<PivotResult<Vec<_>>>()
        .map(Cow::Owned)
}

fn convert_key(value: &Value, data_type: ColumnType) -> Option<Value> {
    value.clone().coerce(&data_type).or_else(|| {
        parse_typed_value(&value.as_display(), &data_type)
            .ok()
            .flatten()
    })
}

//! Wide to long: expands the spec's `.name` columns into rows.
//!
//! Every input row yields one output row per distinct key tuple of the spec.
//! Spec rows sharing a key tuple but naming different `.value` variables are
//! merged into that single output row, one value column each.

use std::collections::HashSet;

use log::debug;

use crate::{
    error::{PivotError, PivotResult},
    frame::{Cell, Column, Table},
    missing::{retain_rows, rows_with_values},
    schema::ColumnType,
    spec::PivotSpec,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LongerOptions {
    /// Drop output rows whose value columns are all missing.
    pub drop_na: bool,
}

impl LongerOptions {
    pub fn drop_na(mut self, drop_na: bool) -> Self {
        self.drop_na = drop_na;
        self
    }
}

struct ValueColumnPlan<'a> {
    name: &'a str,
    data_type: ColumnType,
    /// Source column per key group, `None` where the group lacks this value.
    sources: Vec<Option<&'a Column>>,
}

pub fn pivot_longer(table: &Table, spec: &PivotSpec, options: &LongerOptions) -> PivotResult<Table> {
    spec.validate()?;
    let sources = spec
        .names()
        .iter()
        .enumerate()
        .map(|(row, name)| table.require(name, &format!("spec `.name` row {}", row + 1)))
        .collect::<PivotResult<Vec<_>>>()?;

    let preserved = table.complement(spec.names());
    let value_names = spec.distinct_values();
    ensure_unique_outputs(&preserved, spec, &value_names)?;

    let groups = spec.key_groups();
    let mut plans = Vec::with_capacity(value_names.len());
    for value_name in &value_names {
        let mut data_type: Option<ColumnType> = None;
        let mut group_sources = vec![None; groups.len()];
        for (group_idx, (_, rows)) in groups.iter().enumerate() {
            let Some(&row) = rows.iter().find(|&&row| spec.values()[row] == *value_name) else {
                continue;
            };
            let source = sources[row];
            data_type = Some(match data_type {
                None => source.data_type,
                Some(current) => current.unify(source.data_type).ok_or_else(|| {
                    PivotError::IncompatibleTypes {
                        column: value_name.to_string(),
                        left: current,
                        right: source.data_type,
                    }
                })?,
            });
            group_sources[group_idx] = Some(source);
        }
        plans.push(ValueColumnPlan {
            name: *value_name,
            data_type: data_type.unwrap_or_default(),
            sources: group_sources,
        });
    }

    let input_rows = table.row_count();
    let output_rows = input_rows * groups.len();
    debug!(
        "Pivoting {} row(s) x {} key group(s) into {} row(s); {} preserved, {} key, {} value column(s)",
        input_rows,
        groups.len(),
        output_rows,
        preserved.len(),
        spec.keys().len(),
        plans.len()
    );

    let mut columns = Vec::with_capacity(preserved.len() + spec.keys().len() + plans.len());
    for name in &preserved {
        let source = table.require(name, "preserved columns")?;
        let mut values = Vec::with_capacity(output_rows);
        for row in 0..input_rows {
            values.extend(std::iter::repeat_n(source.values[row].clone(), groups.len()));
        }
        columns.push(Column::new(name.clone(), source.data_type, values));
    }

    for (key_idx, key) in spec.keys().iter().enumerate() {
        let mut values = Vec::with_capacity(output_rows);
        for _ in 0..input_rows {
            values.extend(groups.iter().map(|(tuple, _)| tuple[key_idx].clone()));
        }
        columns.push(Column::new(key.name.clone(), key.data_type, values));
    }

    for plan in &plans {
        let mut values: Vec<Cell> = Vec::with_capacity(output_rows);
        for row in 0..input_rows {
            for source in plan.sources.iter().copied() {
                let cell = source.and_then(|column| column.values[row].clone());
                values.push(cell.map(|v| v.clone().coerce(&plan.data_type).unwrap_or(v)));
            }
        }
        columns.push(Column::new(plan.name, plan.data_type, values));
    }

    if options.drop_na {
        let value_columns = columns[columns.len() - plans.len()..]
            .iter()
            .collect::<Vec<_>>();
        let kept = rows_with_values(&value_columns, output_rows);
        debug!(
            "Dropping {} row(s) with no recorded values",
            output_rows - kept.len()
        );
        if kept.len() != output_rows {
            columns = retain_rows(columns, &kept);
        }
    }

    Table::new(columns)
}

fn ensure_unique_outputs(
    preserved: &[String],
    spec: &PivotSpec,
    value_names: &[&str],
) -> PivotResult<()> {
    let mut seen = HashSet::new();
    let outputs = preserved
        .iter()
        .map(String::as_str)
        .chain(spec.key_names())
        .chain(value_names.iter().copied());
    for name in outputs {
        if !seen.insert(name) {
            return Err(PivotError::duplicate_column(
                name,
                "pivot longer output columns",
            ));
        }
    }
    Ok(())
}

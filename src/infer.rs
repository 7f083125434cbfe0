//! Spec inference: building a [`PivotSpec`] from shorthand arguments.
//!
//! In the long direction the minimal spec has one row per selected column,
//! a single key holding the literal column name, and a constant `.value`.
//! [`LongerSpecOptions`] layers the usual naming rules on top of that by
//! calling the spec editing methods.
//!
//! In the wide direction the spec is the dual: one row per combination of
//! the distinct `names_from` values and each `values_from` column.

use std::collections::HashSet;

use itertools::Itertools;
use log::debug;

use crate::{
    data::{ComparableValue, name_token},
    error::{PivotError, PivotResult},
    frame::{Cell, Table},
    schema::ColumnType,
    selection::ColumnSelection,
    spec::{KeyColumn, PivotSpec, VALUE_COLUMN},
};

pub const DEFAULT_NAMES_TO: &str = "name";
pub const DEFAULT_VALUES_TO: &str = "value";
pub const DEFAULT_NAMES_SEP: &str = "_";

/// Minimal long-direction spec: `.name` and the `names_to` key both hold the
/// selected column names in table order, `.value` is `values_to`.
pub fn build_longer_spec(
    table: &Table,
    selection: &ColumnSelection,
    names_to: &str,
    values_to: &str,
) -> PivotResult<PivotSpec> {
    let selected = selection.resolve(table)?;
    debug!(
        "Selected {} column(s) to pivot longer: {}",
        selected.len(),
        selected.iter().join(", ")
    );
    let key = KeyColumn::text(names_to, selected.iter().cloned());
    let values = vec![values_to.to_string(); selected.len()];
    PivotSpec::new(selected, values, vec![key])
}

#[derive(Debug, Clone, PartialEq)]
pub enum NamesSplit {
    None,
    Separator(String),
    Pattern(String),
}

#[derive(Debug, Clone)]
pub struct LongerSpecOptions {
    pub names_to: Vec<String>,
    pub names_prefix: Option<String>,
    pub names_split: NamesSplit,
    pub names_types: Vec<(String, ColumnType)>,
    pub values_to: String,
}

impl Default for LongerSpecOptions {
    fn default() -> Self {
        Self {
            names_to: vec![DEFAULT_NAMES_TO.to_string()],
            names_prefix: None,
            names_split: NamesSplit::None,
            names_types: Vec::new(),
            values_to: DEFAULT_VALUES_TO.to_string(),
        }
    }
}

impl LongerSpecOptions {
    pub fn names_to<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names_to = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn values_to(mut self, name: impl Into<String>) -> Self {
        self.values_to = name.into();
        self
    }

    pub fn names_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.names_prefix = Some(prefix.into());
        self
    }

    pub fn names_sep(mut self, sep: impl Into<String>) -> Self {
        self.names_split = NamesSplit::Separator(sep.into());
        self
    }

    pub fn names_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.names_split = NamesSplit::Pattern(pattern.into());
        self
    }

    pub fn names_type(mut self, key: impl Into<String>, data_type: ColumnType) -> Self {
        self.names_types.push((key.into(), data_type));
        self
    }
}

/// Builds a long-direction spec and applies prefix stripping, name splitting
/// and key retyping as requested.
pub fn build_longer_spec_with(
    table: &Table,
    selection: &ColumnSelection,
    options: &LongerSpecOptions,
) -> PivotResult<PivotSpec> {
    let targets = options
        .names_to
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    if targets.is_empty() {
        return Err(PivotError::InvalidSpec(
            "names_to must name at least one column".to_string(),
        ));
    }
    if targets.len() > 1 && options.names_split == NamesSplit::None {
        return Err(PivotError::InvalidSpec(format!(
            "names_to has {} entries; a separator or pattern is required to split names",
            targets.len()
        )));
    }

    let single_value_target = targets.len() == 1 && targets[0] == VALUE_COLUMN;
    let key_name = if targets.len() == 1 && !single_value_target {
        targets[0]
    } else {
        DEFAULT_NAMES_TO
    };
    let mut spec = build_longer_spec(table, selection, key_name, &options.values_to)?;
    if let Some(prefix) = &options.names_prefix {
        spec = spec.strip_key_prefix(key_name, prefix)?;
    }

    spec = match &options.names_split {
        NamesSplit::None if single_value_target => spec.separate_key(key_name, &targets, "\u{0}")?,
        NamesSplit::None => spec,
        NamesSplit::Separator(sep) => spec.separate_key(key_name, &targets, sep)?,
        NamesSplit::Pattern(pattern) => spec.extract_key(key_name, &targets, pattern)?,
    };

    for (key, data_type) in &options.names_types {
        spec = spec.retype_key(key, *data_type)?;
    }
    spec.validate()?;
    Ok(spec)
}

/// Controls how `.name` columns are ordered when several `values_from`
/// columns are spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamesVary {
    /// All key combinations for the first value, then the next value.
    #[default]
    Fastest,
    /// Every value for the first key combination, then the next combination.
    Slowest,
}

#[derive(Debug, Clone)]
pub struct WiderSpecOptions {
    pub names_prefix: String,
    pub names_sep: String,
    pub names_sort: bool,
    /// Cross every distinct value of each `names_from` column. When false only
    /// combinations observed in the data are kept.
    pub names_expand: bool,
    pub names_vary: NamesVary,
}

impl Default for WiderSpecOptions {
    fn default() -> Self {
        Self {
            names_prefix: String::new(),
            names_sep: DEFAULT_NAMES_SEP.to_string(),
            names_sort: false,
            names_expand: true,
            names_vary: NamesVary::Fastest,
        }
    }
}

/// Wide-direction spec from `names_from`/`values_from` shorthand.
pub fn build_wider_spec<S: AsRef<str>>(
    table: &Table,
    names_from: &[S],
    values_from: &[S],
    options: &WiderSpecOptions,
) -> PivotResult<PivotSpec> {
    if names_from.is_empty() {
        return Err(PivotError::EmptySelection {
            context: "names_from".to_string(),
        });
    }
    if values_from.is_empty() {
        return Err(PivotError::EmptySelection {
            context: "values_from".to_string(),
        });
    }
    let key_columns = names_from
        .iter()
        .map(|name| table.require(name.as_ref(), "names_from"))
        .collect::<PivotResult<Vec<_>>>()?;
    for value in values_from {
        table.require(value.as_ref(), "values_from")?;
    }

    let combinations: Vec<Vec<Cell>> = if options.names_expand {
        key_columns
            .iter()
            .map(|column| distinct_cells(column.values.iter(), options.names_sort))
            .multi_cartesian_product()
            .collect()
    } else {
        let rows = (0..table.row_count()).map(|row| {
            key_columns
                .iter()
                .map(|column| column.values[row].clone())
                .collect::<Vec<_>>()
        });
        let mut observed = rows.unique().collect::<Vec<_>>();
        if options.names_sort {
            observed.sort_by_key(|tuple| {
                tuple
                    .iter()
                    .cloned()
                    .map(ComparableValue)
                    .collect::<Vec<_>>()
            });
        }
        observed
    };

    let value_names = values_from.iter().map(|v| v.as_ref()).collect::<Vec<_>>();
    let pairs: Vec<(&str, &Vec<Cell>)> = match options.names_vary {
        NamesVary::Fastest => value_names
            .iter()
            .flat_map(|value| combinations.iter().map(move |combo| (*value, combo)))
            .collect(),
        NamesVary::Slowest => combinations
            .iter()
            .flat_map(|combo| value_names.iter().map(move |value| (*value, combo)))
            .collect(),
    };

    let multiple_values = value_names.len() > 1;
    let mut names = Vec::with_capacity(pairs.len());
    let mut values = Vec::with_capacity(pairs.len());
    let mut key_values: Vec<Vec<Cell>> = vec![Vec::with_capacity(pairs.len()); key_columns.len()];
    for (value, combo) in &pairs {
        let joined_keys = combo
            .iter()
            .map(|cell| name_token(cell.as_ref()))
            .join(&options.names_sep);
        let key_part = format!("{}{}", options.names_prefix, joined_keys);
        let name = if multiple_values {
            format!("{value}{}{key_part}", options.names_sep)
        } else {
            key_part
        };
        names.push(name);
        values.push(value.to_string());
        for (slot, cell) in key_values.iter_mut().zip(combo.iter()) {
            slot.push(cell.clone());
        }
    }

    let keys = key_columns
        .iter()
        .zip(key_values)
        .map(|(column, cells)| KeyColumn::new(column.name.clone(), column.data_type, cells))
        .collect();
    debug!(
        "Built wider spec with {} output column(s) from {} key combination(s)",
        names.len(),
        combinations.len()
    );
    PivotSpec::new(names, values, keys)
}

fn distinct_cells<'a, I>(cells: I, sort: bool) -> Vec<Cell>
where
    I: Iterator<Item = &'a Cell>,
{
    let mut seen = HashSet::new();
    let mut distinct = cells
        .filter(|cell| seen.insert(*cell))
        .cloned()
        .collect::<Vec<_>>();
    if sort {
        distinct.sort_by_key(|cell| ComparableValue(cell.clone()));
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::Column};

    fn billboard() -> Table {
        Table::new(vec![
            Column::from_values("artist", vec![Some("2 Pac"), Some("2Ge+her")]),
            Column::from_values("wk1", vec![Some(87i64), Some(91)]),
            Column::from_values("wk2", vec![Some(82i64), Some(87)]),
        ])
        .unwrap()
    }

    #[test]
    fn minimal_spec_mirrors_selected_names() {
        let spec = build_longer_spec(
            &billboard(),
            &ColumnSelection::StartsWith("wk".into()),
            "week",
            "rank",
        )
        .unwrap();
        assert_eq!(spec.names(), &["wk1", "wk2"]);
        assert_eq!(spec.values(), &["rank", "rank"]);
        assert_eq!(spec.key("week").unwrap().values[0], Some(Value::from("wk1")));
    }

    #[test]
    fn prefix_and_type_rules_apply_to_key() {
        let options = LongerSpecOptions::default()
            .names_to(["week"])
            .values_to("rank")
            .names_prefix("wk")
            .names_type("week", ColumnType::Integer);
        let spec =
            build_longer_spec_with(&billboard(), &ColumnSelection::except(["artist"]), &options)
                .unwrap();
        assert_eq!(spec.key("week").unwrap().data_type, ColumnType::Integer);
        assert_eq!(spec.key("week").unwrap().values[1], Some(Value::Integer(2)));
    }

    #[test]
    fn multiple_targets_require_split_rule() {
        let options = LongerSpecOptions::default().names_to(["a", "b"]);
        let err =
            build_longer_spec_with(&billboard(), &ColumnSelection::except(["artist"]), &options)
                .unwrap_err();
        assert!(matches!(err, PivotError::InvalidSpec(_)));
    }

    #[test]
    fn value_only_target_uses_column_names_as_values() {
        let options = LongerSpecOptions::default().names_to([VALUE_COLUMN]);
        let err =
            build_longer_spec_with(&billboard(), &ColumnSelection::except(["artist"]), &options)
                .unwrap_err();
        // Two rows, no keys left to tell them apart.
        assert!(matches!(err, PivotError::AmbiguousSpec { .. }));
    }

    fn fish() -> Table {
        Table::new(vec![
            Column::from_values("fish", vec![Some("4842"), Some("4842"), Some("4843")]),
            Column::from_values("station", vec![Some("Release"), Some("I80_1"), Some("Release")]),
            Column::from_values("seen", vec![Some(1i64), Some(1), Some(1)]),
        ])
        .unwrap()
    }

    #[test]
    fn wider_spec_uses_first_seen_order() {
        let spec =
            build_wider_spec(&fish(), &["station"], &["seen"], &WiderSpecOptions::default())
                .unwrap();
        assert_eq!(spec.names(), &["Release", "I80_1"]);
        assert_eq!(spec.values(), &["seen", "seen"]);
    }

    #[test]
    fn wider_spec_prefixes_value_name_when_spreading_several_values() {
        let options = WiderSpecOptions {
            names_sort: true,
            ..WiderSpecOptions::default()
        };
        let spec = build_wider_spec(&fish(), &["station"], &["seen", "fish"], &options).unwrap();
        assert_eq!(
            spec.names(),
            &["seen_I80_1", "seen_Release", "fish_I80_1", "fish_Release"]
        );
        let slowest = WiderSpecOptions {
            names_vary: NamesVary::Slowest,
            ..WiderSpecOptions::default()
        };
        let spec = build_wider_spec(&fish(), &["station"], &["seen", "fish"], &slowest).unwrap();
        assert_eq!(
            spec.names(),
            &["seen_Release", "fish_Release", "seen_I80_1", "fish_I80_1"]
        );
    }

    #[test]
    fn wider_spec_expands_or_keeps_observed_combinations() {
        let expanded =
            build_wider_spec(&fish(), &["fish", "station"], &["seen"], &WiderSpecOptions::default())
                .unwrap();
        assert_eq!(
            expanded.names(),
            &["4842_Release", "4842_I80_1", "4843_Release", "4843_I80_1"]
        );
        let observed = WiderSpecOptions {
            names_expand: false,
            ..WiderSpecOptions::default()
        };
        let spec = build_wider_spec(&fish(), &["fish", "station"], &["seen"], &observed).unwrap();
        assert_eq!(spec.names(), &["4842_Release", "4842_I80_1", "4843_Release"]);
    }

    #[test]
    fn wider_spec_reports_unknown_columns() {
        let err = build_wider_spec(&fish(), &["site"], &["seen"], &WiderSpecOptions::default())
            .unwrap_err();
        assert!(matches!(err, PivotError::ColumnNotFound { .. }));
    }
}

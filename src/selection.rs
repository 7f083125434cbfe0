//! Column selection against a table schema.
//!
//! Selections always resolve to concrete names in table order, whatever
//! order the caller listed them in, so specs built from them are stable.

use std::{collections::HashSet, fmt};

use regex::Regex;

use crate::{
    error::{PivotError, PivotResult},
    frame::{Column, Table},
};

type Predicate = Box<dyn Fn(&Column) -> bool + Send + Sync>;

pub enum ColumnSelection {
    All,
    Names(Vec<String>),
    /// Every column except the listed ones (`cols = -x`).
    Except(Vec<String>),
    StartsWith(String),
    Matches(Regex),
    Predicate(Predicate),
}

impl fmt::Debug for ColumnSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSelection::All => write!(f, "All"),
            ColumnSelection::Names(names) => f.debug_tuple("Names").field(names).finish(),
            ColumnSelection::Except(names) => f.debug_tuple("Except").field(names).finish(),
            ColumnSelection::StartsWith(prefix) => {
                f.debug_tuple("StartsWith").field(prefix).finish()
            }
            ColumnSelection::Matches(re) => f.debug_tuple("Matches").field(&re.as_str()).finish(),
            ColumnSelection::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl ColumnSelection {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSelection::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn except<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSelection::Except(names.into_iter().map(Into::into).collect())
    }

    pub fn matches(pattern: &str) -> PivotResult<Self> {
        Regex::new(pattern)
            .map(ColumnSelection::Matches)
            .map_err(|err| PivotError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Column) -> bool + Send + Sync + 'static,
    {
        ColumnSelection::Predicate(Box::new(f))
    }

    /// Resolves to column names in table order.
    pub fn resolve(&self, table: &Table) -> PivotResult<Vec<String>> {
        let resolved = match self {
            ColumnSelection::All => table.complement::<&str>(&[]),
            ColumnSelection::Names(names) => {
                ensure_present(table, names, "column selection")?;
                let wanted = names.iter().map(String::as_str).collect::<HashSet<_>>();
                filter_columns(table, |c| wanted.contains(c.name.as_str()))
            }
            ColumnSelection::Except(names) => {
                ensure_present(table, names, "column exclusion")?;
                table.complement(names)
            }
            ColumnSelection::StartsWith(prefix) => {
                filter_columns(table, |c| c.name.starts_with(prefix.as_str()))
            }
            ColumnSelection::Matches(re) => filter_columns(table, |c| re.is_match(&c.name)),
            ColumnSelection::Predicate(predicate) => filter_columns(table, |c| predicate(c)),
        };
        if resolved.is_empty() {
            return Err(PivotError::EmptySelection {
                context: format!("{self:?}"),
            });
        }
        Ok(resolved)
    }
}

fn ensure_present(table: &Table, names: &[String], context: &str) -> PivotResult<()> {
    for name in names {
        if table.position(name).is_none() {
            return Err(PivotError::column_not_found(name, context));
        }
    }
    Ok(())
}

fn filter_columns<F>(table: &Table, keep: F) -> Vec<String>
where
    F: Fn(&Column) -> bool,
{
    table
        .columns()
        .iter()
        .filter(|c| keep(c))
        .map(|c| c.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn sample() -> Table {
        Table::new(vec![
            Column::from_values("religion", vec![Some("Agnostic")]),
            Column::from_values("<$10k", vec![Some(27i64)]),
            Column::from_values("$10-20k", vec![Some(34i64)]),
        ])
        .unwrap()
    }

    #[test]
    fn except_resolves_complement_in_table_order() {
        let names = ColumnSelection::except(["religion"]).resolve(&sample()).unwrap();
        assert_eq!(names, vec!["<$10k", "$10-20k"]);
    }

    #[test]
    fn except_unknown_column_is_an_error() {
        let err = ColumnSelection::except(["region"])
            .resolve(&sample())
            .unwrap_err();
        assert!(matches!(err, PivotError::ColumnNotFound { ref column, .. } if column == "region"));
    }

    #[test]
    fn names_follow_table_order_not_caller_order() {
        let names = ColumnSelection::names(["$10-20k", "<$10k"])
            .resolve(&sample())
            .unwrap();
        assert_eq!(names, vec!["<$10k", "$10-20k"]);
    }

    #[test]
    fn empty_match_is_reported() {
        let err = ColumnSelection::StartsWith("wk".into())
            .resolve(&sample())
            .unwrap_err();
        assert!(matches!(err, PivotError::EmptySelection { .. }));
    }

    #[test]
    fn predicate_and_pattern_select_by_schema() {
        let ints = ColumnSelection::predicate(|c| c.data_type == ColumnType::Integer)
            .resolve(&sample())
            .unwrap();
        assert_eq!(ints.len(), 2);
        let dollars = ColumnSelection::matches(r"^\$").unwrap().resolve(&sample()).unwrap();
        assert_eq!(dollars, vec!["$10-20k"]);
        assert!(ColumnSelection::matches("(").is_err());
    }
}

//! Command handlers: read the input, build or load a spec, pivot, write.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};

use crate::{
    cli::{
        InputArgs, LongerArgs, LongerSelectionArgs, LongerSpecArgs, OutputArgs, WiderArgs,
        WiderNamingArgs, WiderSpecArgs,
    },
    data::{Value, parse_typed_value},
    frame::Table,
    infer::{LongerSpecOptions, WiderSpecOptions, build_longer_spec_with, build_wider_spec},
    io_utils,
    longer::{LongerOptions, pivot_longer},
    missing::ValuesFill,
    schema::{ColumnType, infer_column_type},
    selection::ColumnSelection,
    spec::PivotSpec,
    spec_io, table,
    wider::{WiderOptions, pivot_wider},
};

pub fn execute_longer(args: &LongerArgs) -> Result<()> {
    let (input, delimiter) = load_input(&args.input)?;
    let spec = match &args.spec {
        Some(path) => spec_io::load(path)?,
        None => longer_spec(&input, &args.selection)?,
    };
    let options = LongerOptions::default().drop_na(args.drop_na);
    let output = pivot_longer(&input, &spec, &options)
        .with_context(|| format!("Pivoting {:?} longer", args.input.input))?;
    info!(
        "Pivoted {} row(s) x {} column(s) longer into {} row(s) x {} column(s)",
        input.row_count(),
        input.column_count(),
        output.row_count(),
        output.column_count()
    );
    emit(&output, &args.output, delimiter)
}

pub fn execute_wider(args: &WiderArgs) -> Result<()> {
    let (input, delimiter) = load_input(&args.input)?;
    let spec = match &args.spec {
        Some(path) => spec_io::load(path)?,
        None => wider_spec(&input, &args.naming)?,
    };
    let mut options = WiderOptions::default()
        .values_fill(parse_values_fill(&input, &spec, &args.values_fill)?)
        .duplicates(args.duplicates.into());
    if !args.id_cols.is_empty() {
        options = options.id_cols(args.id_cols.iter().cloned());
    }
    let output = pivot_wider(&input, &spec, &options)
        .with_context(|| format!("Pivoting {:?} wider", args.input.input))?;
    info!(
        "Pivoted {} row(s) x {} column(s) wider into {} row(s) x {} column(s)",
        input.row_count(),
        input.column_count(),
        output.row_count(),
        output.column_count()
    );
    emit(&output, &args.output, delimiter)
}

pub fn execute_longer_spec(args: &LongerSpecArgs) -> Result<()> {
    let (input, _) = load_input(&args.input)?;
    let spec = longer_spec(&input, &args.selection)?;
    write_spec(&spec, args.output.as_deref())
}

pub fn execute_wider_spec(args: &WiderSpecArgs) -> Result<()> {
    let (input, _) = load_input(&args.input)?;
    let spec = wider_spec(&input, &args.naming)?;
    write_spec(&spec, args.output.as_deref())
}

/// Reads the input table, returning it with the delimiter it was read with.
pub(crate) fn load_input(args: &InputArgs) -> Result<(Table, u8)> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        crate::printable_delimiter(delimiter)
    );
    let table = io_utils::read_table(&args.input, delimiter, encoding)
        .with_context(|| format!("Reading {:?}", args.input))?;
    Ok((table, delimiter))
}

fn emit(table: &Table, args: &OutputArgs, input_delimiter: u8) -> Result<()> {
    let output_path = args.output.as_deref();
    let writing_to_stdout = output_path.is_none_or(io_utils::is_dash);
    if args.table && writing_to_stdout {
        print!("{}", table::render_frame(table, None));
        return Ok(());
    }
    if args.table {
        debug!("--table requested but output will remain CSV because a file path was provided");
    }
    let delimiter =
        io_utils::resolve_output_delimiter(output_path, args.output_delimiter, input_delimiter);
    io_utils::write_table(table, output_path, delimiter)
}

fn write_spec(spec: &PivotSpec, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) if !io_utils::is_dash(path) => {
            spec_io::save(spec, path)?;
            info!("Wrote {} spec row(s) to {:?}", spec.len(), path);
        }
        _ => {
            let (headers, rows) = spec_io::text_rows(spec)?;
            table::print_table(&headers, &rows);
        }
    }
    Ok(())
}

fn selection_from_args(args: &LongerSelectionArgs) -> Result<ColumnSelection> {
    let mut chosen = Vec::new();
    if !args.cols.is_empty() {
        chosen.push(ColumnSelection::names(args.cols.iter().cloned()));
    }
    if !args.exclude.is_empty() {
        chosen.push(ColumnSelection::except(args.exclude.iter().cloned()));
    }
    if let Some(prefix) = &args.starts_with {
        chosen.push(ColumnSelection::StartsWith(prefix.clone()));
    }
    if let Some(pattern) = &args.matches {
        chosen.push(ColumnSelection::matches(pattern)?);
    }
    match chosen.len() {
        0 => bail!("Choose columns to pivot with --cols, --exclude, --starts-with, or --matches"),
        1 => Ok(chosen.remove(0)),
        _ => bail!("Use only one of --cols, --exclude, --starts-with, or --matches"),
    }
}

fn longer_spec(input: &Table, args: &LongerSelectionArgs) -> Result<PivotSpec> {
    let selection = selection_from_args(args)?;
    let mut options = LongerSpecOptions::default()
        .names_to(args.names_to.iter().cloned())
        .values_to(args.values_to.clone());
    if let Some(prefix) = &args.names_prefix {
        options = options.names_prefix(prefix.clone());
    }
    if let Some(sep) = &args.names_sep {
        options = options.names_sep(sep.clone());
    }
    if let Some(pattern) = &args.names_pattern {
        options = options.names_pattern(pattern.clone());
    }
    for assignment in &args.names_types {
        let (key, data_type) = parse_assignment(assignment, "--names-type")?;
        let data_type = data_type.parse::<ColumnType>()?;
        options = options.names_type(key, data_type);
    }
    debug!("Longer spec options: {options:?}");
    Ok(build_longer_spec_with(input, &selection, &options)?)
}

fn wider_spec(input: &Table, args: &WiderNamingArgs) -> Result<PivotSpec> {
    let options = WiderSpecOptions {
        names_prefix: args.names_prefix.clone(),
        names_sep: args.names_sep.clone(),
        names_sort: args.names_sort,
        names_expand: !args.observed_only,
        names_vary: args.names_vary.into(),
    };
    Ok(build_wider_spec(
        input,
        &args.names_from,
        &args.values_from,
        &options,
    )?)
}

/// Parses `--values-fill` entries. `column=literal` is typed by the value
/// column; a bare literal is typed by inspection and applies to every column.
fn parse_values_fill(input: &Table, spec: &PivotSpec, entries: &[String]) -> Result<ValuesFill> {
    let mut fill = ValuesFill::none();
    for entry in entries {
        match entry.split_once('=') {
            Some((column, literal)) => {
                let column = column.trim();
                if !spec.values().iter().any(|v| v == column) {
                    bail!("--values-fill column '{column}' is not a value column of the pivot");
                }
                let data_type = input
                    .column(column)
                    .map(|c| c.data_type)
                    .ok_or_else(|| anyhow!("Value column '{column}' not found in input"))?;
                fill = fill.with(column, parse_fill_literal(literal, data_type)?);
            }
            None => {
                let data_type = infer_column_type([entry.as_str()], 0);
                fill = fill.with_default(parse_fill_literal(entry, data_type)?);
            }
        }
    }
    Ok(fill)
}

fn parse_fill_literal(literal: &str, data_type: ColumnType) -> Result<Value> {
    parse_typed_value(literal, &data_type)?
        .ok_or_else(|| anyhow!("--values-fill literal cannot be empty"))
}

fn parse_assignment<'a>(value: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    value
        .split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .ok_or_else(|| anyhow!("{flag} expects `name=value`, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;
    use crate::spec::KeyColumn;

    fn long_table() -> Table {
        Table::new(vec![
            Column::from_values("fish", vec![Some("4842")]),
            Column::from_values("station", vec![Some("Release")]),
            Column::from_values("seen", vec![Some(1i64)]),
        ])
        .unwrap()
    }

    fn seen_spec() -> PivotSpec {
        PivotSpec::builder()
            .row("Release", "seen")
            .key(KeyColumn::text("station", ["Release"]))
            .build()
            .unwrap()
    }

    #[test]
    fn values_fill_entries_are_typed_by_value_column() {
        let fill = parse_values_fill(&long_table(), &seen_spec(), &["seen=0".to_string()]).unwrap();
        assert_eq!(fill.for_value("seen"), Some(&Value::Integer(0)));
    }

    #[test]
    fn bare_values_fill_applies_to_all_columns() {
        let fill = parse_values_fill(
            &long_table(),
            &seen_spec(),
            &["seen=2".to_string(), "0".to_string()],
        )
        .unwrap();
        assert_eq!(fill.for_value("seen"), Some(&Value::Integer(2)));
        assert_eq!(fill.for_value("other"), Some(&Value::Integer(0)));
    }

    #[test]
    fn values_fill_rejects_unknown_columns() {
        let err = parse_values_fill(&long_table(), &seen_spec(), &["fish=0".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("not a value column"));
    }

    #[test]
    fn selection_requires_exactly_one_rule() {
        let mut args = LongerSelectionArgs {
            cols: Vec::new(),
            exclude: Vec::new(),
            starts_with: None,
            matches: None,
            names_to: vec!["name".into()],
            values_to: "value".into(),
            names_prefix: None,
            names_sep: None,
            names_pattern: None,
            names_types: Vec::new(),
        };
        assert!(selection_from_args(&args).is_err());
        args.exclude = vec!["fish".into()];
        assert!(matches!(
            selection_from_args(&args).unwrap(),
            ColumnSelection::Except(_)
        ));
        args.starts_with = Some("s".into());
        assert!(selection_from_args(&args).is_err());
    }

    #[test]
    fn assignment_requires_both_sides() {
        assert_eq!(parse_assignment("week=integer", "--names-type").unwrap(), ("week", "integer"));
        assert!(parse_assignment("week=", "--names-type").is_err());
    }
}

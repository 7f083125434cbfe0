use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{infer::NamesVary, wider::DuplicatePolicy};

#[derive(Debug, Parser)]
#[command(author, version, about = "Pivot CSV files between long and wide form", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pivot selected columns into rows (wide to long)
    Longer(LongerArgs),
    /// Pivot rows into columns (long to wide)
    Wider(WiderArgs),
    /// Infer a pivot spec and write it out for editing
    #[command(subcommand)]
    Spec(SpecCommands),
    /// Preview the first few rows of a CSV file with inferred column types
    Preview(PreviewArgs),
}

#[derive(Debug, Subcommand)]
pub enum SpecCommands {
    /// Spec for pivoting longer
    Longer(LongerSpecArgs),
    /// Spec for pivoting wider
    Wider(WiderSpecArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Render output as an elastic table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LongerSelectionArgs {
    /// Columns to pivot into rows
    #[arg(short = 'C', long = "cols", value_delimiter = ',')]
    pub cols: Vec<String>,
    /// Pivot every column except these
    #[arg(long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,
    /// Pivot columns whose name starts with this prefix
    #[arg(long = "starts-with")]
    pub starts_with: Option<String>,
    /// Pivot columns whose name matches this regular expression
    #[arg(long = "matches")]
    pub matches: Option<String>,
    /// Key column(s) receiving the pivoted column names; `.value` routes a name piece into the value column name
    #[arg(long = "names-to", value_delimiter = ',', default_value = "name")]
    pub names_to: Vec<String>,
    /// Column receiving the cell values
    #[arg(long = "values-to", default_value = "value")]
    pub values_to: String,
    /// Prefix removed from column names before they become keys
    #[arg(long = "names-prefix")]
    pub names_prefix: Option<String>,
    /// Separator splitting column names across --names-to
    #[arg(long = "names-sep", conflicts_with = "names_pattern")]
    pub names_sep: Option<String>,
    /// Regular expression whose capture groups split column names across --names-to
    #[arg(long = "names-pattern")]
    pub names_pattern: Option<String>,
    /// Retype a key column, e.g. `week=integer`
    #[arg(long = "names-type", action = clap::ArgAction::Append)]
    pub names_types: Vec<String>,
}

#[derive(Debug, Args)]
pub struct LongerArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub selection: LongerSelectionArgs,
    /// Pivot spec file (YAML, JSON, or CSV) to use instead of the naming options
    #[arg(long = "spec")]
    pub spec: Option<PathBuf>,
    /// Drop rows where every value column is missing
    #[arg(long = "drop-na")]
    pub drop_na: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum NamesVaryArg {
    #[default]
    Fastest,
    Slowest,
}

impl From<NamesVaryArg> for NamesVary {
    fn from(value: NamesVaryArg) -> Self {
        match value {
            NamesVaryArg::Fastest => NamesVary::Fastest,
            NamesVaryArg::Slowest => NamesVary::Slowest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum DuplicatesArg {
    #[default]
    Error,
    First,
    Last,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(value: DuplicatesArg) -> Self {
        match value {
            DuplicatesArg::Error => DuplicatePolicy::Error,
            DuplicatesArg::First => DuplicatePolicy::First,
            DuplicatesArg::Last => DuplicatePolicy::Last,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WiderNamingArgs {
    /// Column(s) whose values become output column names
    #[arg(long = "names-from", value_delimiter = ',', default_value = "name")]
    pub names_from: Vec<String>,
    /// Column(s) whose values fill the new columns
    #[arg(long = "values-from", value_delimiter = ',', default_value = "value")]
    pub values_from: Vec<String>,
    /// Prefix added to every generated column name
    #[arg(long = "names-prefix", default_value = "")]
    pub names_prefix: String,
    /// Separator joining name pieces
    #[arg(long = "names-sep", default_value = "_")]
    pub names_sep: String,
    /// Order new columns by value instead of first appearance
    #[arg(long = "names-sort")]
    pub names_sort: bool,
    /// Only create columns for combinations present in the data
    #[arg(long = "observed-only")]
    pub observed_only: bool,
    /// Column ordering when several --values-from columns are spread
    #[arg(long = "names-vary", value_enum, default_value = "fastest")]
    pub names_vary: NamesVaryArg,
}

#[derive(Debug, Args)]
pub struct WiderArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub naming: WiderNamingArgs,
    /// Pivot spec file (YAML, JSON, or CSV) to use instead of the naming options
    #[arg(long = "spec")]
    pub spec: Option<PathBuf>,
    /// Columns identifying each output row (defaults to all remaining columns)
    #[arg(long = "id-cols", value_delimiter = ',')]
    pub id_cols: Vec<String>,
    /// Fill for absent cells: `literal` for every value column or `column=literal`
    #[arg(long = "values-fill", action = clap::ArgAction::Append)]
    pub values_fill: Vec<String>,
    /// What to do when several rows map to one cell
    #[arg(long = "duplicates", value_enum, default_value = "error")]
    pub duplicates: DuplicatesArg,
}

#[derive(Debug, Args)]
pub struct LongerSpecArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub selection: LongerSelectionArgs,
    /// Destination spec file; format follows the extension (.yaml, .json, .csv)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WiderSpecArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub naming: WiderNamingArgs,
    /// Destination spec file; format follows the extension (.yaml, .json, .csv)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_single_chars() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("::").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn longer_arguments_parse() {
        let cli = Cli::try_parse_from([
            "csv-reshape",
            "longer",
            "-i",
            "billboard.csv",
            "--starts-with",
            "wk",
            "--names-to",
            "week",
            "--names-prefix",
            "wk",
            "--names-type",
            "week=integer",
            "--values-to",
            "rank",
            "--drop-na",
        ])
        .unwrap();
        match cli.command {
            Commands::Longer(args) => {
                assert_eq!(args.selection.names_to, vec!["week"]);
                assert_eq!(args.selection.starts_with.as_deref(), Some("wk"));
                assert!(args.drop_na);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn names_sep_conflicts_with_pattern() {
        let result = Cli::try_parse_from([
            "csv-reshape",
            "longer",
            "-i",
            "x.csv",
            "--names-sep",
            "_",
            "--names-pattern",
            "(.)(.)",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn wider_defaults_match_tidy_conventions() {
        let cli = Cli::try_parse_from(["csv-reshape", "wider", "-i", "long.csv"]).unwrap();
        match cli.command {
            Commands::Wider(args) => {
                assert_eq!(args.naming.names_from, vec!["name"]);
                assert_eq!(args.naming.values_from, vec!["value"]);
                assert_eq!(args.naming.names_sep, "_");
                assert_eq!(args.duplicates, DuplicatesArg::Error);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

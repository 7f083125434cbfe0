//! Persisting pivot specs so they can be edited by hand and reused.
//!
//! Specs are stored either as a YAML/JSON document or as a delimited table
//! with `.name`, `.value`, and one column per key. The format is chosen from
//! the file extension.

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::UTF_8;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, display_cell, parse_typed_value},
    frame::{Column, Table},
    io_utils,
    schema::ColumnType,
    spec::{KeyColumn, NAME_COLUMN, PivotSpec, VALUE_COLUMN},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Yaml,
    Json,
    Delimited(u8),
}

impl SpecFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => SpecFormat::Json,
            Some("csv") => SpecFormat::Delimited(io_utils::DEFAULT_CSV_DELIMITER),
            Some("tsv") => SpecFormat::Delimited(io_utils::DEFAULT_TSV_DELIMITER),
            _ => SpecFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpecDocument {
    #[serde(default)]
    keys: Vec<KeySchema>,
    rows: Vec<SpecRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeySchema {
    name: String,
    #[serde(rename = "type", default)]
    data_type: ColumnType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpecRecord {
    name: String,
    value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    keys: Vec<Option<Scalar>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Boolean(b) => Scalar::Bool(*b),
            Value::Integer(i) => Scalar::Int(*i),
            Value::Float(f) => Scalar::Float(*f),
            other => Scalar::Text(other.as_display()),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

impl SpecDocument {
    fn from_spec(spec: &PivotSpec) -> Self {
        let keys = spec
            .keys()
            .iter()
            .map(|k| KeySchema {
                name: k.name.clone(),
                data_type: k.data_type,
            })
            .collect();
        let rows = (0..spec.len())
            .map(|row| SpecRecord {
                name: spec.names()[row].clone(),
                value: spec.values()[row].clone(),
                keys: spec
                    .key_tuple(row)
                    .iter()
                    .map(|cell| cell.as_ref().map(Scalar::from_value))
                    .collect(),
            })
            .collect();
        Self { keys, rows }
    }

    fn into_spec(self) -> Result<PivotSpec> {
        let mut key_values = vec![Vec::with_capacity(self.rows.len()); self.keys.len()];
        let mut names = Vec::with_capacity(self.rows.len());
        let mut values = Vec::with_capacity(self.rows.len());
        for record in self.rows {
            if record.keys.len() != self.keys.len() {
                return Err(anyhow!(
                    "Spec row '{}' lists {} key value(s) but {} key column(s) are declared",
                    record.name,
                    record.keys.len(),
                    self.keys.len()
                ));
            }
            for ((slot, schema), scalar) in key_values.iter_mut().zip(&self.keys).zip(&record.keys)
            {
                let text = scalar.as_ref().map(Scalar::as_text).unwrap_or_default();
                let parsed = parse_typed_value(&text, &schema.data_type).with_context(|| {
                    format!("Key '{}' in spec row '{}'", schema.name, record.name)
                })?;
                slot.push(parsed);
            }
            names.push(record.name);
            values.push(record.value);
        }
        let keys = self
            .keys
            .into_iter()
            .zip(key_values)
            .map(|(schema, cells)| KeyColumn::new(schema.name, schema.data_type, cells))
            .collect();
        Ok(PivotSpec::new(names, values, keys)?)
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Opening spec file {path:?}"))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_string(path: &Path, contents: &str) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("Creating spec file {path:?}"))?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub fn to_yaml(spec: &PivotSpec) -> Result<String> {
    serde_yaml::to_string(&SpecDocument::from_spec(spec)).context("Serializing spec to YAML")
}

pub fn from_yaml(input: &str) -> Result<PivotSpec> {
    let document: SpecDocument = serde_yaml::from_str(input).context("Parsing spec YAML")?;
    document.into_spec()
}

pub fn to_json(spec: &PivotSpec) -> Result<String> {
    serde_json::to_string_pretty(&SpecDocument::from_spec(spec)).context("Serializing spec to JSON")
}

pub fn from_json(input: &str) -> Result<PivotSpec> {
    let document: SpecDocument = serde_json::from_str(input).context("Parsing spec JSON")?;
    document.into_spec()
}

pub fn load(path: &Path) -> Result<PivotSpec> {
    match SpecFormat::from_path(path) {
        SpecFormat::Yaml => from_yaml(&read_to_string(path)?),
        SpecFormat::Json => from_json(&read_to_string(path)?),
        SpecFormat::Delimited(delimiter) => {
            let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
            let (headers, rows) = io_utils::read_text_rows(&mut reader, UTF_8)?;
            from_text_rows(&headers, &rows)
        }
    }
    .with_context(|| format!("Loading pivot spec from {path:?}"))
}

/// Builds a spec from its table form. `.name` and `.value` are taken as
/// written; only the key columns are typed by inspection.
pub fn from_text_rows(headers: &[String], rows: &[Vec<String>]) -> Result<PivotSpec> {
    let typed = Table::from_text_rows(headers, rows)?;
    let columns = typed
        .into_columns()
        .into_iter()
        .enumerate()
        .map(|(idx, column)| {
            if column.name != NAME_COLUMN && column.name != VALUE_COLUMN {
                return column;
            }
            let raw = rows
                .iter()
                .map(|row| {
                    row.get(idx)
                        .filter(|text| !text.is_empty())
                        .map(|text| Value::from(text.as_str()))
                })
                .collect();
            Column::new(column.name, ColumnType::String, raw)
        })
        .collect();
    Ok(PivotSpec::from_table(&Table::new(columns)?)?)
}

pub fn save(spec: &PivotSpec, path: &Path) -> Result<()> {
    match SpecFormat::from_path(path) {
        SpecFormat::Yaml => write_string(path, &to_yaml(spec)?),
        SpecFormat::Json => write_string(path, &to_json(spec)?),
        SpecFormat::Delimited(delimiter) => {
            io_utils::write_table(&spec.to_table()?, Some(path), delimiter)
        }
    }
    .with_context(|| format!("Writing pivot spec to {path:?}"))
}

/// Text rendering of a spec's table form, used for previews.
pub fn text_rows(spec: &PivotSpec) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let table = spec.to_table()?;
    let headers = table.column_names().iter().map(|s| s.to_string()).collect();
    let rows = (0..table.row_count())
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|c| display_cell(c.get(row)))
                .collect()
        })
        .collect();
    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(lines: &[&[&str]]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|line| line.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn family_spec() -> PivotSpec {
        let names = ["dob_child1", "dob_child2", "gender_child1", "gender_child2"];
        PivotSpec::builder()
            .row(names[0], "v")
            .row(names[1], "v")
            .row(names[2], "v")
            .row(names[3], "v")
            .key(KeyColumn::text("name", names))
            .build()
            .unwrap()
            .separate_key("name", &[VALUE_COLUMN, "child"], "_child")
            .unwrap()
            .retype_key("child", ColumnType::Integer)
            .unwrap()
    }

    #[test]
    fn yaml_round_trip_preserves_typed_keys() {
        let spec = family_spec();
        let yaml = to_yaml(&spec).unwrap();
        assert!(yaml.contains("type: integer"));
        assert_eq!(from_yaml(&yaml).unwrap(), spec);
    }

    #[test]
    fn json_round_trip_preserves_spec() {
        let spec = family_spec();
        assert_eq!(from_json(&to_json(&spec).unwrap()).unwrap(), spec);
    }

    #[test]
    fn hand_written_yaml_accepts_missing_keys() {
        let yaml = r#"
keys:
  - name: child
    type: integer
rows:
  - name: dob_child1
    value: dob
    keys: [1]
  - name: note
    value: note
    keys: [null]
"#;
        let spec = from_yaml(yaml).unwrap();
        assert_eq!(spec.key("child").unwrap().values, vec![Some(Value::Integer(1)), None]);
    }

    #[test]
    fn key_count_mismatch_is_reported() {
        let yaml = "keys: [{name: child}]\nrows: [{name: a, value: v}]\n";
        let err = from_yaml(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("lists 0 key value(s)"));
    }

    #[test]
    fn delimited_spec_keeps_names_and_values_as_written() {
        let headers = vec![".name".to_string(), ".value".to_string(), "site".to_string()];
        let spec = from_text_rows(
            &headers,
            &rows(&[&["007", "001", "7"], &["010", "001", "10"]]),
        )
        .unwrap();
        assert_eq!(spec.names(), ["007", "010"]);
        assert_eq!(spec.values(), ["001", "001"]);
        assert_eq!(spec.key("site").unwrap().data_type, ColumnType::Integer);
        assert_eq!(
            spec.key("site").unwrap().values,
            vec![Some(Value::Integer(7)), Some(Value::Integer(10))]
        );
    }

    #[test]
    fn delimited_spec_requires_every_name() {
        let headers = vec![".name".to_string(), ".value".to_string()];
        let err = from_text_rows(&headers, &rows(&[&["a", "v"], &["", "v"]])).unwrap_err();
        assert!(format!("{err:#}").contains("missing in spec row 2"));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(SpecFormat::from_path(Path::new("s.JSON")), SpecFormat::Json);
        assert_eq!(SpecFormat::from_path(Path::new("s.tsv")), SpecFormat::Delimited(b'\t'));
        assert_eq!(SpecFormat::from_path(Path::new("s.yml")), SpecFormat::Yaml);
    }
}

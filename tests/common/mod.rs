#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_reshape::{Table, io_utils};
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads a fixture into a typed table.
pub fn fixture_table(name: &str) -> Table {
    io_utils::read_table(&fixture_path(name), b',', UTF_8).expect("read fixture")
}

/// Builds a typed table from CSV text.
pub fn table_from_csv(contents: &str) -> Table {
    let mut reader = io_utils::open_csv_reader(contents.as_bytes(), b',');
    let (headers, rows) = io_utils::read_text_rows(&mut reader, UTF_8).expect("parse csv");
    Table::from_text_rows(&headers, &rows).expect("type csv")
}

/// Reads a CSV file back as raw text rows, header first.
pub fn read_csv_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("open csv");
    reader
        .records()
        .map(|record| {
            record
                .expect("csv record")
                .iter()
                .map(|field| field.to_string())
                .collect()
        })
        .collect()
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

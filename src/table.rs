//! Elastic plain-text rendering of tables for `--table` and previews.
//!
//! Numeric columns are right-aligned and missing cells show as `NA`, so a
//! reshaped table reads the same way it would in an interactive session.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    data::{MISSING_TOKEN, Value},
    frame::Table,
    schema::ColumnType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let aligns = vec![Align::Left; headers.len()];
    render_aligned(headers, rows, &aligns, None)
}

/// Renders up to `limit` rows of a typed table with a trailing row count.
pub fn render_frame(table: &Table, limit: Option<usize>) -> String {
    let headers = table
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    let aligns = table
        .columns()
        .iter()
        .map(|c| match c.data_type {
            ColumnType::Integer | ColumnType::Float => Align::Right,
            _ => Align::Left,
        })
        .collect::<Vec<_>>();
    let shown = limit.unwrap_or(usize::MAX).min(table.row_count());
    let rows = (0..shown)
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|c| {
                    c.get(row)
                        .map(Value::as_display)
                        .unwrap_or_else(|| MISSING_TOKEN.to_string())
                })
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    let footer = (shown < table.row_count())
        .then(|| format!("... {} more row(s)", table.row_count() - shown));
    render_aligned(&headers, &rows, &aligns, footer.as_deref())
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn render_aligned(
    headers: &[String],
    rows: &[Vec<String>],
    aligns: &[Align],
    footer: Option<&str>,
) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, aligns));
    let separator_cells = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let left = vec![Align::Left; widths.len()];
    let _ = writeln!(output, "{}", format_row(&separator_cells, &widths, &left));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    if let Some(footer) = footer {
        let _ = writeln!(output, "{footer}");
    }
    output
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            match aligns.get(idx).copied().unwrap_or(Align::Left) {
                Align::Left => format!("{sanitized}{padding}"),
                Align::Right => format!("{padding}{sanitized}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

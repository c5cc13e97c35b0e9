//! Ordered tabular rows.
//!
//! Catalog rows keep whatever columns the backing table has, so a row is a
//! JSON object with insertion order preserved. [`Table`] adds an explicit
//! column list so that result sets with heterogeneous rows (for example
//! hierarchy nodes whose ancestor could not be resolved) still render with
//! one consistent header.

use serde::Serialize;
use serde_json::{Map, Value};

/// One catalog or result row: column name → value, in column order.
pub type Row = Map<String, Value>;

/// A set of rows sharing an ordered column list.
///
/// An empty table has no columns and no rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Build a table whose columns are the union of every row's keys, in
    /// first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Render as a GitHub-style pipe table. Missing and null cells are
    /// empty. An empty table renders as an empty string.
    pub fn to_markdown(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        out.push_str("| ");
        out.push_str(
            &self
                .columns
                .iter()
                .map(|c| escape_cell(c))
                .collect::<Vec<_>>()
                .join(" | "),
        );
        out.push_str(" |\n|");
        for _ in &self.columns {
            out.push_str(":---|");
        }
        out.push('\n');

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| escape_cell(&row.get(c).map(cell_text).unwrap_or_default()))
                .collect();
            out.push_str("| ");
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");
        }
        out
    }
}

/// Plain-text rendering of a cell value: null → `""`, strings unquoted,
/// everything else in its JSON form.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\r', '\n'], " ")
}

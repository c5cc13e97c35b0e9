//! In-memory [`CatalogStore`] implementation for tests and offline snapshots.
//!
//! Tables are plain `Vec<Row>`s behind a `std::sync::RwLock`. Reading a
//! table that was never inserted yields no rows.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::catalog::id_text;
use crate::table::Row;

use super::CatalogStore;

/// In-memory store keyed by table name.
pub struct InMemoryCatalogStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Builder form of [`insert_table`](Self::insert_table).
    pub fn with_table(self, table: &str, rows: Vec<Row>) -> Self {
        self.insert_table(table, rows);
        self
    }

    /// Replace the contents of `table`.
    pub fn insert_table(&self, table: &str, rows: Vec<Row>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.to_string(), rows);
        }
    }

    fn filtered(&self, table: &str, keep: impl Fn(&Row) -> bool) -> Result<Vec<Row>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| keep(r)).cloned().collect())
            .unwrap_or_default())
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn row_id(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(id_text)
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn load_table(&self, table: &str) -> Result<Vec<Row>> {
        self.filtered(table, |_| true)
    }

    async fn fetch_by_ids(
        &self,
        table: &str,
        id_column: &str,
        ids: &[String],
    ) -> Result<Vec<Row>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.filtered(table, |row| {
            row_id(row, id_column).is_some_and(|id| wanted.contains(id.as_str()))
        })
    }

    async fn fetch_where_eq(&self, table: &str, column: &str, value: &str) -> Result<Vec<Row>> {
        self.filtered(table, |row| {
            row_id(row, column).is_some_and(|v| v == value)
        })
    }

    async fn fetch_by_prefix(
        &self,
        table: &str,
        id_column: &str,
        prefix: &str,
        direct_only: bool,
    ) -> Result<Vec<Row>> {
        let head = format!("{}.", prefix);
        let mut rows = self.filtered(table, |row| {
            row_id(row, id_column).is_some_and(|id| match id.strip_prefix(&head) {
                Some(rest) => !direct_only || !rest.contains('.'),
                None => false,
            })
        })?;
        rows.sort_by_key(|row| row_id(row, id_column));
        Ok(rows)
    }
}

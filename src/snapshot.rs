//! JSON catalog snapshots.
//!
//! A snapshot is a JSON array of row objects:
//!
//! ```json
//! [
//!   { "item": "9.3", "name": "Gantry", "quantity": 1 },
//!   { "item": "9.3.4", "name": "Wooden Screw M10", "material": "Oak" }
//! ]
//! ```
//!
//! `bomd import <table> <file>` upserts the rows into SQLite, keyed by the
//! table's primary key. The same rows can be handed straight to an
//! [`InMemoryCatalogStore`] for offline matching.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use bom_digest_core::error::validate_identifier;
use bom_digest_core::store::memory::InMemoryCatalogStore;
use bom_digest_core::table::Row;
use serde_json::Value;
use sqlx::{QueryBuilder, Row as _, Sqlite, SqlitePool};

use crate::config::Config;
use crate::db;

/// Read a snapshot file. Every element must be a JSON object.
pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    parse_rows(&content).with_context(|| format!("Invalid snapshot: {}", path.display()))
}

pub fn parse_rows(content: &str) -> Result<Vec<Row>> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        bail!("snapshot must be a JSON array of objects");
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            other => bail!("snapshot element {} is not an object: {}", i, other),
        })
        .collect()
}

/// An in-memory store holding the given snapshot files, one per table.
pub fn memory_store(tables: &[(&str, &Path)]) -> Result<InMemoryCatalogStore> {
    let store = InMemoryCatalogStore::new();
    for (table, path) in tables {
        store.insert_table(table, load_rows(path)?);
    }
    Ok(store)
}

struct TableInfo {
    columns: Vec<String>,
    primary_key: String,
}

async fn table_info(pool: &SqlitePool, table: &str) -> Result<TableInfo> {
    validate_identifier(table)?;
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;
    if rows.is_empty() {
        bail!("unknown table: {} (run `bomd init` first?)", table);
    }

    let mut columns = Vec::with_capacity(rows.len());
    let mut primary_key = None;
    for row in &rows {
        let name: String = row.get("name");
        let pk: i64 = row.get("pk");
        if pk == 1 {
            primary_key = Some(name.clone());
        }
        columns.push(name);
    }

    let Some(primary_key) = primary_key else {
        bail!("table {} has no primary key to upsert on", table);
    };
    Ok(TableInfo {
        columns,
        primary_key,
    })
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => qb.push_bind(None::<String>),
        Value::Bool(b) => qb.push_bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => qb.push_bind(i),
            None => qb.push_bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => qb.push_bind(s.clone()),
        other => qb.push_bind(other.to_string()),
    };
}

/// Upsert `rows` into `table` inside one transaction. Returns the number
/// of rows written.
///
/// # Errors
///
/// Fails before writing anything if a row names a column the table does
/// not have, or lacks the primary key.
pub async fn import_rows(pool: &SqlitePool, table: &str, rows: &[Row]) -> Result<usize> {
    let info = table_info(pool, table).await?;
    let known: HashSet<&str> = info.columns.iter().map(String::as_str).collect();

    for (i, row) in rows.iter().enumerate() {
        if let Some(unknown) = row.keys().find(|k| !known.contains(k.as_str())) {
            bail!("row {}: unknown column '{}' for table {}", i, unknown, table);
        }
        if matches!(row.get(&info.primary_key), None | Some(Value::Null)) {
            bail!("row {}: missing primary key '{}'", i, info.primary_key);
        }
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) VALUES (", table, columns.join(", ")));
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_value(&mut qb, &row[*column]);
        }
        qb.push(format!(") ON CONFLICT({}) DO ", info.primary_key));

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != info.primary_key)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        if updates.is_empty() {
            qb.push("NOTHING");
        } else {
            qb.push(format!("UPDATE SET {}", updates.join(", ")));
        }

        qb.build().execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(table, rows = rows.len(), "snapshot imported");
    Ok(rows.len())
}

/// CLI entry point for `bomd import`.
pub async fn run_import(config: &Config, table: &str, file: &Path) -> Result<()> {
    let rows = load_rows(file)?;
    let pool = db::connect(config).await?;
    let result = import_rows(&pool, table, &rows).await;
    pool.close().await;
    let count = result?;
    println!("imported {} rows into {}", count, table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(r#"[{"item": "9.3", "name": "Gantry"}, {"item": 7}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], json!("Gantry"));
        assert!(parse_rows(r#"{"item": "9.3"}"#).is_err());
        assert!(parse_rows(r#"[1, 2]"#).is_err());
    }

    #[tokio::test]
    async fn test_import_upserts() {
        let pool = pool().await;
        let rows = parse_rows(
            r#"[{"item": "9.3", "name": "Gantry", "quantity": 1},
                {"item": "9.3.4", "name": "Wooden Screw", "mass": 0.02}]"#,
        )
        .unwrap();
        assert_eq!(import_rows(&pool, "machine_details", &rows).await.unwrap(), 2);

        let update = parse_rows(r#"[{"item": "9.3.4", "name": "Wooden Screw M10"}]"#).unwrap();
        import_rows(&pool, "machine_details", &update).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM machine_details")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
        let (name, mass): (String, f64) =
            sqlx::query_as("SELECT name, mass FROM machine_details WHERE item = '9.3.4'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(name, "Wooden Screw M10");
        assert_eq!(mass, 0.02);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_column() {
        let pool = pool().await;
        let rows = parse_rows(r#"[{"supplier_id": "s1", "ceo": "Ana"}]"#).unwrap();
        let err = import_rows(&pool, "supplier_master", &rows).await.unwrap_err();
        assert!(err.to_string().contains("unknown column 'ceo'"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM supplier_master")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_import_requires_primary_key() {
        let pool = pool().await;
        let rows = parse_rows(r#"[{"name": "Gantry"}]"#).unwrap();
        let err = import_rows(&pool, "machine_details", &rows).await.unwrap_err();
        assert!(err.to_string().contains("missing primary key 'item'"));
    }

    #[tokio::test]
    async fn test_import_unknown_table() {
        let pool = pool().await;
        let err = import_rows(&pool, "nope", &[]).await.unwrap_err();
        assert!(err.to_string().contains("unknown table"));
    }

    #[tokio::test]
    async fn test_memory_store_from_files() {
        use bom_digest_core::store::CatalogStore;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine_details.json");
        std::fs::write(&path, r#"[{"item": "9.3", "name": "Gantry"}]"#).unwrap();

        let store = memory_store(&[("machine_details", path.as_path())]).unwrap();
        let rows = store.load_table("machine_details").await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}

//! SQLite-backed [`CatalogStore`].
//!
//! Columns are decoded dynamically from each value's storage class, so any
//! catalog table works without a compile-time schema:
//!
//! | Storage class | JSON value |
//! |---------------|------------|
//! | `NULL` | `null` |
//! | `INTEGER` | number |
//! | `REAL` | number |
//! | `TEXT` | string |
//! | `BLOB` | string (lossy UTF-8) |
//!
//! Table and column names are checked with
//! [`validate_identifier`](bom_digest_core::error::validate_identifier)
//! before being spliced into SQL. Every value is a bound parameter, and
//! every call runs under the configured query timeout.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bom_digest_core::error::{validate_identifier, MatchError};
use bom_digest_core::store::CatalogStore;
use bom_digest_core::table::Row;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, QueryBuilder, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};

pub struct SqliteCatalogStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn with_timeout<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MatchError::Timeout {
                what: what.to_string(),
                secs: self.timeout.as_secs(),
            }
            .into()),
        }
    }
}

fn check(names: &[&str]) -> Result<()> {
    for name in names {
        validate_identifier(name)?;
    }
    Ok(())
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        let i = column.ordinal();
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" => json!(row.try_get::<i64, _>(i)?),
                "REAL" => json!(row.try_get::<f64, _>(i)?),
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(i)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get::<String, _>(i)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_all(rows: &[SqliteRow]) -> Result<Vec<Row>> {
    rows.iter().map(decode_row).collect()
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn load_table(&self, table: &str) -> Result<Vec<Row>> {
        check(&[table])?;
        let sql = format!("SELECT * FROM {}", table);
        self.with_timeout(&format!("loading {}", table), async {
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            decode_all(&rows)
        })
        .await
    }

    async fn fetch_by_ids(
        &self,
        table: &str,
        id_column: &str,
        ids: &[String],
    ) -> Result<Vec<Row>> {
        check(&[table, id_column])?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE {} IN (", table, id_column));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(format!(") ORDER BY {}", id_column));

        self.with_timeout(&format!("fetching {} by id", table), async {
            let rows = qb.build().fetch_all(&self.pool).await?;
            decode_all(&rows)
        })
        .await
    }

    async fn fetch_where_eq(&self, table: &str, column: &str, value: &str) -> Result<Vec<Row>> {
        check(&[table, column])?;
        let sql = format!("SELECT * FROM {} WHERE {} = ?", table, column);
        self.with_timeout(&format!("querying {}", table), async {
            let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?;
            decode_all(&rows)
        })
        .await
    }

    async fn fetch_by_prefix(
        &self,
        table: &str,
        id_column: &str,
        prefix: &str,
        direct_only: bool,
    ) -> Result<Vec<Row>> {
        check(&[table, id_column])?;
        let head = format!("{}.", escape_like(prefix));

        let mut sql = format!(
            "SELECT * FROM {t} WHERE {c} LIKE ? ESCAPE '\\'",
            t = table,
            c = id_column
        );
        if direct_only {
            sql.push_str(&format!(" AND {} NOT LIKE ? ESCAPE '\\'", id_column));
        }
        sql.push_str(&format!(" ORDER BY {}", id_column));

        self.with_timeout(&format!("fetching {} by prefix", table), async {
            let mut query = sqlx::query(&sql).bind(format!("{}%", head));
            if direct_only {
                query = query.bind(format!("{}%.%", head));
            }
            let rows = query.fetch_all(&self.pool).await?;
            decode_all(&rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        for (item, name, quantity, mass) in [
            ("9", "Robot", 1, 120.5),
            ("9.3", "Gantry", 1, 40.0),
            ("9.3.4", "Wooden Screw M10", 12, 0.02),
            ("9.3.4.1", "Washer", 12, 0.001),
            ("9.4", "Belt", 2, 0.3),
        ] {
            sqlx::query("INSERT INTO machine_details (item, name, quantity, mass) VALUES (?, ?, ?, ?)")
                .bind(item)
                .bind(name)
                .bind(quantity)
                .bind(mass)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    fn store(pool: SqlitePool) -> SqliteCatalogStore {
        SqliteCatalogStore::new(pool, Duration::from_secs(5))
    }

    fn items(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r["item"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_load_table_decodes_storage_classes() {
        let store = store(memory_pool().await);
        let rows = store.load_table("machine_details").await.unwrap();
        assert_eq!(rows.len(), 5);
        let screw = rows.iter().find(|r| r["item"] == json!("9.3.4")).unwrap();
        assert_eq!(screw["name"], json!("Wooden Screw M10"));
        assert_eq!(screw["quantity"], json!(12));
        assert_eq!(screw["mass"], json!(0.02));
        assert_eq!(screw["internal_part_name"], Value::Null);
        let keys: Vec<&str> = screw.keys().map(String::as_str).collect();
        assert_eq!(&keys[..3], &["item", "name", "internal_part_name"]);
    }

    #[tokio::test]
    async fn test_fetch_by_ids() {
        let store = store(memory_pool().await);
        let ids = vec!["9.3.4".to_string(), "9".to_string(), "missing".to_string()];
        let rows = store.fetch_by_ids("machine_details", "item", &ids).await.unwrap();
        assert_eq!(items(&rows), vec!["9", "9.3.4"]);
        assert!(store
            .fetch_by_ids("machine_details", "item", &[])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_fetch_by_prefix() {
        let store = store(memory_pool().await);
        let all = store
            .fetch_by_prefix("machine_details", "item", "9", false)
            .await
            .unwrap();
        assert_eq!(items(&all), vec!["9.3", "9.3.4", "9.3.4.1", "9.4"]);
        let direct = store
            .fetch_by_prefix("machine_details", "item", "9.3", true)
            .await
            .unwrap();
        assert_eq!(items(&direct), vec!["9.3.4"]);
    }

    #[tokio::test]
    async fn test_fetch_where_eq() {
        let store = store(memory_pool().await);
        let rows = store
            .fetch_where_eq("machine_details", "name", "Gantry")
            .await
            .unwrap();
        assert_eq!(items(&rows), vec!["9.3"]);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_identifiers() {
        let store = store(memory_pool().await);
        let err = store
            .load_table("machine_details; DROP TABLE machine_details")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchError>(),
            Some(MatchError::InvalidIdentifier(_))
        ));
        assert!(store
            .fetch_where_eq("machine_details", "name = name OR 1", "x")
            .await
            .is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("9.3"), "9.3");
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
    }
}

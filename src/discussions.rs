//! Stored digest summaries (`discussion_summary`).

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::prompt::DigestEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discussion {
    pub discussion_id: i64,
    pub item_id: Option<String>,
    pub supplier_id: Option<String>,
    pub summary: String,
    pub latest_update: String,
    /// ISO 8601, UTC.
    pub created_at: String,
}

pub fn format_created_at(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Insert `entries` with a shared `created_at`, in one transaction.
pub async fn insert_entries(
    pool: &SqlitePool,
    entries: &[DigestEntry],
    created_at: DateTime<Utc>,
) -> Result<usize> {
    let created_at = format_created_at(created_at);
    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(
            "INSERT INTO discussion_summary (item_id, supplier_id, summary, latest_update, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.item_id)
        .bind(&entry.supplier_id)
        .bind(&entry.summary)
        .bind(&entry.latest_update)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(entries.len())
}

/// Summaries, newest first, optionally for one component or after a
/// `created_at` cutoff (exclusive).
pub async fn list(
    pool: &SqlitePool,
    item_id: Option<&str>,
    since: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<Discussion>> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM discussion_summary", COLUMNS));
    let mut clause = " WHERE ";
    if let Some(item_id) = item_id {
        query.push(clause).push("item_id = ").push_bind(item_id);
        clause = " AND ";
    }
    if let Some(since) = since {
        query.push(clause).push("created_at > ").push_bind(since);
    }
    query.push(" ORDER BY created_at DESC, discussion_id DESC");
    if let Some(limit) = limit {
        query.push(" LIMIT ").push_bind(limit);
    }

    let rows = query.build().fetch_all(pool).await?;
    Ok(rows.iter().map(from_row).collect())
}

/// Replacement values for one stored summary.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryUpdate {
    pub item_id: Option<String>,
    pub supplier_id: Option<String>,
    pub summary: String,
    pub latest_update: String,
    /// RFC 3339; `None` stamps the current time.
    pub created_at: Option<DateTime<Utc>>,
}

/// Overwrite a summary. `None` when no row has `discussion_id`.
pub async fn update(
    pool: &SqlitePool,
    discussion_id: i64,
    changes: &SummaryUpdate,
) -> Result<Option<Discussion>> {
    let created_at = format_created_at(changes.created_at.unwrap_or_else(Utc::now));

    let result = sqlx::query(
        "UPDATE discussion_summary SET item_id = ?, supplier_id = ?, summary = ?, latest_update = ?, created_at = ? WHERE discussion_id = ?",
    )
    .bind(&changes.item_id)
    .bind(&changes.supplier_id)
    .bind(&changes.summary)
    .bind(&changes.latest_update)
    .bind(&created_at)
    .bind(discussion_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM discussion_summary WHERE discussion_id = ?",
        COLUMNS
    ))
    .bind(discussion_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(from_row))
}

/// Remove a summary. Returns whether a row was deleted.
pub async fn delete(pool: &SqlitePool, discussion_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM discussion_summary WHERE discussion_id = ?")
        .bind(discussion_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

const COLUMNS: &str = "discussion_id, item_id, supplier_id, summary, latest_update, created_at";

fn from_row(row: &SqliteRow) -> Discussion {
    Discussion {
        discussion_id: row.get("discussion_id"),
        item_id: row.get("item_id"),
        supplier_id: row.get("supplier_id"),
        summary: row.get("summary"),
        latest_update: row.get("latest_update"),
        created_at: row.get("created_at"),
    }
}

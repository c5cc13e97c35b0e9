use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the catalog and discussion tables. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Component catalog: `item` is the dot-delimited hierarchy id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS machine_details (
            item TEXT PRIMARY KEY,
            name TEXT,
            internal_part_name TEXT,
            quantity INTEGER,
            material TEXT,
            category TEXT,
            mass REAL,
            length REAL,
            finish TEXT,
            notes TEXT,
            child_identifier TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Supplier catalog
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS supplier_master (
            supplier_id TEXT PRIMARY KEY,
            supplier_name TEXT,
            supplier_type TEXT,
            hq_country TEXT,
            hq_region TEXT,
            primary_contact_name TEXT,
            primary_contact_email TEXT,
            primary_contact_phone TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Digest output
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discussion_summary (
            discussion_id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id TEXT,
            supplier_id TEXT,
            summary TEXT NOT NULL,
            latest_update TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discussion_item_id ON discussion_summary(item_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discussion_created_at ON discussion_summary(created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("migrations applied");
    Ok(())
}

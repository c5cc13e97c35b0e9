//! Storage abstraction for catalog reads.
//!
//! The [`CatalogStore`] trait is the only way the engine reaches backing
//! data. It is read-only: no writes originate from the core.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`load_table`](CatalogStore::load_table) | Bulk read of a whole table |
//! | [`fetch_by_ids`](CatalogStore::fetch_by_ids) | Rows whose id column is in a set |
//! | [`fetch_where_eq`](CatalogStore::fetch_where_eq) | Rows where a column equals a string |
//! | [`fetch_by_prefix`](CatalogStore::fetch_by_prefix) | Hierarchical descendants of an id |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::table::Row;

/// Abstract read access to catalog tables.
///
/// Identifier values are compared as strings; numeric ids in the backing
/// table match their decimal rendering.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Read every row of `table`, in storage order.
    async fn load_table(&self, table: &str) -> Result<Vec<Row>>;

    /// Read every row of `table` whose `id_column` is one of `ids`, in a
    /// single query. An empty `ids` slice returns no rows.
    async fn fetch_by_ids(&self, table: &str, id_column: &str, ids: &[String])
        -> Result<Vec<Row>>;

    /// Read every row of `table` whose `column` equals `value` exactly.
    async fn fetch_where_eq(&self, table: &str, column: &str, value: &str) -> Result<Vec<Row>>;

    /// Read the hierarchical descendants of `prefix` (ids starting with
    /// `prefix.`), ordered by id. With `direct_only`, only one level down.
    async fn fetch_by_prefix(
        &self,
        table: &str,
        id_column: &str,
        prefix: &str,
        direct_only: bool,
    ) -> Result<Vec<Row>>;
}

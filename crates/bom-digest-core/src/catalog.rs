//! Catalog model: schema, entries, searchable text, and the lazy catalog cache.
//!
//! A catalog is a table of rows with arbitrary columns. Its
//! [`CatalogSchema`] declares which column holds the identifier and which
//! columns make up the searchable text that keywords are scored against.
//!
//! | Catalog | Table | Id column | Text columns |
//! |---------|-------|-----------|--------------|
//! | Components | `machine_details` | `item` | `name`, `internal_part_name` |
//! | Suppliers | `supplier_master` | `supplier_id` | `supplier_name`, `primary_contact_name` |

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{validate_identifier, MatchError, Result};
use crate::store::CatalogStore;
use crate::table::{cell_text, Row};

/// Which catalog a match came from. Decides the name of the matched-text
/// column in flattened records so both result sets can be joined later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Component,
    Supplier,
}

impl CatalogKind {
    pub fn matched_text_column(self) -> &'static str {
        match self {
            CatalogKind::Component => "matched_component_text",
            CatalogKind::Supplier => "matched_supplier_text",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CatalogKind::Component => "component",
            CatalogKind::Supplier => "supplier",
        }
    }
}

/// Declared shape of a catalog table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSchema {
    pub kind: CatalogKind,
    pub table: String,
    pub id_column: String,
    pub text_columns: Vec<String>,
}

impl CatalogSchema {
    pub fn components() -> Self {
        Self {
            kind: CatalogKind::Component,
            table: "machine_details".to_string(),
            id_column: "item".to_string(),
            text_columns: vec!["name".to_string(), "internal_part_name".to_string()],
        }
    }

    pub fn suppliers() -> Self {
        Self {
            kind: CatalogKind::Supplier,
            table: "supplier_master".to_string(),
            id_column: "supplier_id".to_string(),
            text_columns: vec![
                "supplier_name".to_string(),
                "primary_contact_name".to_string(),
            ],
        }
    }

    /// Reject table or column names that are not plain SQL identifiers.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.id_column)?;
        for column in &self.text_columns {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

/// Something that can be fuzzy-matched: it has an identifier, a derived
/// searchable text, and the full row it came from.
pub trait SearchableTextSource {
    fn identifier(&self) -> Option<String>;
    fn searchable_text(&self) -> &str;
    fn row(&self) -> &Row;
}

/// One loaded catalog row plus its derived searchable text.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    row: Row,
    identifier: Option<String>,
    searchable_text: String,
}

impl CatalogEntry {
    pub fn new(schema: &CatalogSchema, row: Row) -> Self {
        let identifier = row.get(&schema.id_column).and_then(id_text);
        let searchable_text = build_searchable_text(&row, &schema.text_columns);
        Self {
            row,
            identifier,
            searchable_text,
        }
    }
}

impl SearchableTextSource for CatalogEntry {
    fn identifier(&self) -> Option<String> {
        self.identifier.clone()
    }

    fn searchable_text(&self) -> &str {
        &self.searchable_text
    }

    fn row(&self) -> &Row {
        &self.row
    }
}

/// Join the text columns with single spaces, missing or null values as
/// `""`, and trim the ends. Case is preserved.
pub fn build_searchable_text(row: &Row, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| row.get(c).map(cell_text).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// String form of an identifier value. Null has no identifier.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An immutable, fully loaded catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: CatalogSchema,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn from_rows(schema: CatalogSchema, rows: Vec<Row>) -> Self {
        let entries = rows
            .into_iter()
            .map(|row| CatalogEntry::new(&schema, row))
            .collect();
        Self { schema, entries }
    }

    /// Load the whole table named by `schema` with one bulk read.
    pub async fn load(store: &dyn CatalogStore, schema: CatalogSchema) -> Result<Self> {
        schema.validate()?;
        let rows = store.load_table(&schema.table).await?;
        tracing::debug!(
            table = %schema.table,
            rows = rows.len(),
            "catalog loaded"
        );
        Ok(Self::from_rows(schema, rows))
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    pub fn kind(&self) -> CatalogKind {
        self.schema.kind
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Searchable texts in entry order; index `i` belongs to `entries()[i]`.
    pub fn searchable_texts(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.searchable_text()).collect()
    }
}

/// Explicit lazy cache for a catalog that is only needed on demand.
///
/// The first [`get_or_load`](Self::get_or_load) queries the store; later
/// calls return the same `Arc` until [`refresh`](Self::refresh) or
/// [`invalidate`](Self::invalidate). Concurrent first calls may each query
/// the store; the last one to finish wins.
pub struct CatalogCache {
    schema: CatalogSchema,
    loaded: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogCache {
    pub fn new(schema: CatalogSchema) -> Self {
        Self {
            schema,
            loaded: RwLock::new(None),
        }
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    pub fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }

    pub async fn get_or_load(&self, store: &dyn CatalogStore) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.cached() {
            return Ok(catalog);
        }
        self.refresh(store).await
    }

    /// Re-query the store and replace the cached catalog.
    pub async fn refresh(&self, store: &dyn CatalogStore) -> Result<Arc<Catalog>> {
        let catalog = Arc::new(Catalog::load(store, self.schema.clone()).await?);
        let mut slot = self
            .loaded
            .write()
            .map_err(|_| MatchError::Store(anyhow::anyhow!("catalog cache lock poisoned")))?;
        *slot = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.loaded.write() {
            *slot = None;
        }
    }

    fn cached(&self) -> Option<Arc<Catalog>> {
        self.loaded.read().ok().and_then(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryCatalogStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_searchable_text_joins_and_trims() {
        let schema = CatalogSchema::components();
        let e = CatalogEntry::new(
            &schema,
            row(json!({"item": "9.3.4", "name": "Wooden Screw M10", "internal_part_name": null})),
        );
        assert_eq!(e.searchable_text(), "Wooden Screw M10");
        assert_eq!(e.identifier().as_deref(), Some("9.3.4"));

        let e = CatalogEntry::new(
            &schema,
            row(json!({"item": "1", "name": "  Frame", "internal_part_name": "FRM-01 "})),
        );
        assert_eq!(e.searchable_text(), "Frame FRM-01");
    }

    #[test]
    fn test_searchable_text_missing_columns() {
        let schema = CatalogSchema::suppliers();
        let e = CatalogEntry::new(&schema, row(json!({"supplier_id": "s1"})));
        assert_eq!(e.searchable_text(), "");
        let e = CatalogEntry::new(
            &schema,
            row(json!({"supplier_id": "s1", "primary_contact_name": "Ana Ruiz"})),
        );
        assert_eq!(e.searchable_text(), "Ana Ruiz");
    }

    #[test]
    fn test_numeric_identifier_stringified() {
        let schema = CatalogSchema::components();
        let e = CatalogEntry::new(&schema, row(json!({"item": 10, "name": "Gantry"})));
        assert_eq!(e.identifier().as_deref(), Some("10"));
        let e = CatalogEntry::new(&schema, row(json!({"item": null, "name": "Gantry"})));
        assert_eq!(e.identifier(), None);
    }

    #[test]
    fn test_schema_validate() {
        assert!(CatalogSchema::components().validate().is_ok());
        let mut bad = CatalogSchema::components();
        bad.table = "machine_details; --".to_string();
        assert!(matches!(
            bad.validate(),
            Err(MatchError::InvalidIdentifier(_))
        ));
    }

    struct CountingStore {
        inner: InMemoryCatalogStore,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl CatalogStore for CountingStore {
        async fn load_table(&self, table: &str) -> anyhow::Result<Vec<Row>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_table(table).await
        }
        async fn fetch_by_ids(
            &self,
            table: &str,
            id_column: &str,
            ids: &[String],
        ) -> anyhow::Result<Vec<Row>> {
            self.inner.fetch_by_ids(table, id_column, ids).await
        }
        async fn fetch_where_eq(
            &self,
            table: &str,
            column: &str,
            value: &str,
        ) -> anyhow::Result<Vec<Row>> {
            self.inner.fetch_where_eq(table, column, value).await
        }
        async fn fetch_by_prefix(
            &self,
            table: &str,
            id_column: &str,
            prefix: &str,
            direct_only: bool,
        ) -> anyhow::Result<Vec<Row>> {
            self.inner
                .fetch_by_prefix(table, id_column, prefix, direct_only)
                .await
        }
    }

    #[tokio::test]
    async fn test_cache_loads_once_until_invalidated() {
        let store = CountingStore {
            inner: InMemoryCatalogStore::new().with_table(
                "supplier_master",
                vec![row(json!({"supplier_id": "s1", "supplier_name": "BondBrook Adhesives"}))],
            ),
            loads: AtomicUsize::new(0),
        };
        let cache = CatalogCache::new(CatalogSchema::suppliers());
        assert!(!cache.is_loaded());

        let a = cache.get_or_load(&store).await.unwrap();
        let b = cache.get_or_load(&store).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 1);

        cache.refresh(&store).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        cache.invalidate();
        assert!(!cache.is_loaded());
        cache.get_or_load(&store).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_empty_catalog() {
        let store = InMemoryCatalogStore::new();
        let catalog = Catalog::load(&store, CatalogSchema::components())
            .await
            .unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.searchable_texts().is_empty());
    }
}

//! The matching session: texts in, matched components (and optionally
//! suppliers) out, with hierarchy expansion on request.
//!
//! A [`ComponentMatcher`] owns a loaded component catalog and an explicit
//! [`CatalogCache`] for the supplier catalog, which is only read from the
//! store the first time supplier matching is requested.

use std::sync::Arc;

use serde::Serialize;

use crate::aggregate::{match_keywords, records_to_table, MatchOptions, MatchRecord};
use crate::catalog::{Catalog, CatalogCache, CatalogSchema};
use crate::error::{MatchError, Result};
use crate::hierarchy::{self, GapPolicy, HierarchyNode};
use crate::keywords::KeywordExtractor;
use crate::store::CatalogStore;
use crate::table::Table;

/// Component and supplier records from one [`find_components`] call.
///
/// [`find_components`]: ComponentMatcher::find_components
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchResult {
    pub keywords: Vec<String>,
    pub components: Vec<MatchRecord>,
    /// Empty unless supplier matching was requested.
    pub suppliers: Vec<MatchRecord>,
}

impl MatchResult {
    pub fn component_table(&self) -> Table {
        records_to_table(&self.components)
    }

    pub fn supplier_table(&self) -> Table {
        records_to_table(&self.suppliers)
    }
}

/// Matches plus the hierarchy-closed component set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub matches: MatchResult,
    pub hierarchy: Vec<HierarchyNode>,
}

impl Resolution {
    pub fn hierarchy_table(&self, id_column: &str) -> Table {
        hierarchy::nodes_to_table(&self.hierarchy, id_column)
    }
}

pub struct ComponentMatcher {
    store: Option<Arc<dyn CatalogStore>>,
    components: Arc<Catalog>,
    suppliers: CatalogCache,
    extractor: KeywordExtractor,
    options: MatchOptions,
    gap_policy: GapPolicy,
}

impl ComponentMatcher {
    /// A matcher over an already loaded component catalog, with no store.
    /// Supplier matching and hierarchy expansion will fail with
    /// [`MatchError::StoreRequired`] until a store is attached.
    pub fn new(components: Catalog) -> Self {
        Self {
            store: None,
            components: Arc::new(components),
            suppliers: CatalogCache::new(CatalogSchema::suppliers()),
            extractor: KeywordExtractor::default(),
            options: MatchOptions::default(),
            gap_policy: GapPolicy::default(),
        }
    }

    /// Load the component catalog from `store` and keep the store for
    /// supplier and hierarchy lookups.
    pub async fn from_store(store: Arc<dyn CatalogStore>, components: CatalogSchema) -> Result<Self> {
        let catalog = Catalog::load(store.as_ref(), components).await?;
        tracing::info!(
            table = %catalog.schema().table,
            entries = catalog.len(),
            "component catalog loaded"
        );
        Ok(Self::new(catalog).with_store(store))
    }

    pub fn with_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_supplier_schema(mut self, schema: CatalogSchema) -> Self {
        self.suppliers = CatalogCache::new(schema);
        self
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    pub fn with_extractor(mut self, extractor: KeywordExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn components(&self) -> &Catalog {
        &self.components
    }

    pub fn supplier_cache(&self) -> &CatalogCache {
        &self.suppliers
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Extract and pool keywords from every non-empty text.
    pub fn extract_keywords<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        self.extractor.extract_all(texts)
    }

    /// Match every keyword of `texts` against the component catalog and,
    /// when `with_suppliers` is set, against the supplier catalog.
    ///
    /// # Errors
    ///
    /// [`MatchError::StoreRequired`] if suppliers are requested without a
    /// store; any store error from the first supplier load.
    pub async fn find_components<S: AsRef<str>>(
        &self,
        texts: &[S],
        with_suppliers: bool,
    ) -> Result<MatchResult> {
        let store = if with_suppliers {
            Some(self.require_store(self.suppliers.schema().kind.as_str())?)
        } else {
            None
        };

        let keywords = self.extract_keywords(texts);
        let components = match_keywords(&keywords, &self.components, &self.options);

        let suppliers = match store {
            Some(store) => {
                let catalog = self.suppliers.get_or_load(store.as_ref()).await?;
                match_keywords(&keywords, &catalog, &self.options)
            }
            None => Vec::new(),
        };

        tracing::info!(
            texts = texts.len(),
            keywords = keywords.len(),
            components = components.len(),
            suppliers = suppliers.len(),
            "components matched"
        );

        Ok(MatchResult {
            keywords,
            components,
            suppliers,
        })
    }

    /// Close matched component records over their ancestors.
    pub async fn expand_hierarchy(&self, records: &[MatchRecord]) -> Result<Vec<HierarchyNode>> {
        let store = self.require_store("component hierarchy")?;
        hierarchy::expand_records(
            store.as_ref(),
            self.components.schema(),
            records,
            self.gap_policy,
        )
        .await
    }

    /// [`find_components`](Self::find_components) followed by
    /// [`expand_hierarchy`](Self::expand_hierarchy) on the component
    /// records.
    pub async fn resolve<S: AsRef<str>>(&self, texts: &[S], with_suppliers: bool) -> Result<Resolution> {
        let matches = self.find_components(texts, with_suppliers).await?;
        let hierarchy = if matches.components.is_empty() {
            Vec::new()
        } else {
            self.expand_hierarchy(&matches.components).await?
        };
        Ok(Resolution { matches, hierarchy })
    }

    fn require_store(&self, catalog: &str) -> Result<&Arc<dyn CatalogStore>> {
        self.store.as_ref().ok_or_else(|| MatchError::StoreRequired {
            catalog: catalog.to_string(),
        })
    }
}

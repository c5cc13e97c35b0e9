//! `bomd match`: run the resolution engine on ad-hoc text.
//!
//! Catalogs come from the configured SQLite database, or from JSON
//! snapshots when `--components` is given (no database needed).

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use bom_digest_core::matcher::ComponentMatcher;
use bom_digest_core::store::CatalogStore;
use bom_digest_core::table::Table;
use serde::Serialize;

use crate::config::Config;
use crate::db;
use crate::digest::build_matcher;
use crate::snapshot;

pub struct MatchArgs<'a> {
    pub texts: &'a [String],
    pub supplier_search: bool,
    pub expand: bool,
    pub json: bool,
    /// Component snapshot; switches to an in-memory catalog.
    pub components_file: Option<&'a Path>,
    pub suppliers_file: Option<&'a Path>,
}

#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub keywords: Vec<String>,
    pub components: Table,
    pub suppliers: Table,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<Table>,
}

pub async fn resolve_texts(
    matcher: &ComponentMatcher,
    texts: &[String],
    supplier_search: bool,
    expand: bool,
) -> Result<MatchReport> {
    let matches = matcher.find_components(texts, supplier_search).await?;
    let hierarchy = if expand {
        let nodes = matcher.expand_hierarchy(&matches.components).await?;
        let id_column = &matcher.components().schema().id_column;
        Some(bom_digest_core::hierarchy::nodes_to_table(&nodes, id_column))
    } else {
        None
    };
    Ok(MatchReport {
        components: matches.component_table(),
        suppliers: matches.supplier_table(),
        keywords: matches.keywords,
        hierarchy,
    })
}

async fn snapshot_matcher(
    config: &Config,
    components_file: &Path,
    suppliers_file: Option<&Path>,
) -> Result<ComponentMatcher> {
    let catalog = &config.catalog;
    let mut tables = vec![(catalog.component_table.as_str(), components_file)];
    if let Some(path) = suppliers_file {
        tables.push((catalog.supplier_table.as_str(), path));
    }
    let store: Arc<dyn CatalogStore> = Arc::new(snapshot::memory_store(&tables)?);
    Ok(
        ComponentMatcher::from_store(store, catalog.component_schema())
            .await?
            .with_supplier_schema(catalog.supplier_schema())
            .with_options(config.matching.options())
            .with_gap_policy(config.matching.hierarchy_gaps),
    )
}

/// CLI entry point for `bomd match`.
pub async fn run_match(config: &Config, args: MatchArgs<'_>) -> Result<()> {
    let report = match args.components_file {
        Some(path) => {
            let matcher = snapshot_matcher(config, path, args.suppliers_file).await?;
            resolve_texts(&matcher, args.texts, args.supplier_search, args.expand).await?
        }
        None => {
            let pool = db::connect(config).await?;
            let result = async {
                let (_store, matcher) = build_matcher(config, &pool).await?;
                resolve_texts(&matcher, args.texts, args.supplier_search, args.expand).await
            }
            .await;
            pool.close().await;
            result?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Keywords: {}", report.keywords.join(", "));
    print_table("Components", &report.components);
    if args.supplier_search {
        print_table("Suppliers", &report.suppliers);
    }
    if let Some(hierarchy) = &report.hierarchy {
        print_table("Hierarchy", hierarchy);
    }
    Ok(())
}

fn print_table(title: &str, table: &Table) {
    println!();
    println!("{} ({})", title, table.len());
    if !table.is_empty() {
        print!("{}", table.to_markdown());
    }
}

//! The digest pipeline: chat messages in, stored component summaries out.
//!
//! ```text
//! MessageSource ─▶ texts ─▶ ComponentMatcher ─▶ hierarchy ─▶ prompt ─▶ LlmClient
//!                                                                         │
//!                            discussion_summary ◀─ parse_llm_output ◀─────┘
//! ```
//!
//! When nothing matches, the LLM is not called.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bom_digest_core::matcher::ComponentMatcher;
use bom_digest_core::store::CatalogStore;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::discussions;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::prompt::{self, DigestEntry};
use crate::source::{FileSource, MessageSource, SlackSource};
use crate::sqlite_store::SqliteCatalogStore;

#[derive(Debug, Clone, Copy)]
pub struct DigestRequest {
    pub lookback_minutes: u32,
    pub supplier_search: bool,
}

/// Collaborators of one digest run.
pub struct DigestDeps<'a> {
    pub matcher: &'a ComponentMatcher,
    pub source: &'a dyn MessageSource,
    pub llm: &'a dyn LlmClient,
    /// Where summaries are stored. `None` skips persistence.
    pub pool: Option<&'a SqlitePool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message_count: usize,
    /// Rows in the expanded component table (matches plus ancestors).
    pub component_count: usize,
    pub supplier_count: usize,
    pub discussions: Vec<DigestEntry>,
}

impl DigestOutcome {
    fn empty(success: bool, message: impl Into<String>, message_count: usize) -> Self {
        Self {
            success,
            message: message.into(),
            error: None,
            message_count,
            component_count: 0,
            supplier_count: 0,
            discussions: Vec::new(),
        }
    }
}

/// A SQLite catalog store and a matcher over its component table, as
/// configured.
pub async fn build_matcher(
    config: &Config,
    pool: &SqlitePool,
) -> Result<(Arc<dyn CatalogStore>, ComponentMatcher)> {
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(
        pool.clone(),
        Duration::from_secs(config.catalog.query_timeout_secs),
    ));
    let matcher =
        ComponentMatcher::from_store(store.clone(), config.catalog.component_schema())
            .await?
            .with_supplier_schema(config.catalog.supplier_schema())
            .with_options(config.matching.options())
            .with_gap_policy(config.matching.hierarchy_gaps);
    Ok((store, matcher))
}

/// Run one digest.
///
/// # Errors
///
/// Message source, catalog and LLM failures. A failure to store the
/// summaries is logged and does not fail the run.
pub async fn run_digest(request: DigestRequest, deps: DigestDeps<'_>) -> Result<DigestOutcome> {
    let messages = deps.source.fetch(request.lookback_minutes).await?;
    if messages.is_empty() {
        let mut outcome = DigestOutcome::empty(false, "No messages found", 0);
        outcome.error = Some(format!(
            "No messages found in {} from the last {} minutes",
            deps.source.describe(),
            request.lookback_minutes
        ));
        return Ok(outcome);
    }

    let texts: Vec<&str> = messages
        .iter()
        .map(|m| m.text.as_str())
        .filter(|t| !t.is_empty())
        .collect();

    let resolution = deps
        .matcher
        .resolve(&texts, request.supplier_search)
        .await?;
    let components = resolution.hierarchy_table(&deps.matcher.components().schema().id_column);
    let suppliers = resolution.matches.supplier_table();

    let nothing_matched =
        components.is_empty() && (!request.supplier_search || suppliers.is_empty());
    if nothing_matched {
        tracing::info!(messages = messages.len(), "no components found in messages");
        return Ok(DigestOutcome::empty(
            true,
            "No components found in messages",
            messages.len(),
        ));
    }

    let prompt = if request.supplier_search {
        prompt::supplier_prompt(&messages, &components.to_markdown(), &suppliers.to_markdown())
    } else {
        prompt::manufacturing_prompt(&messages, &components.to_markdown())
    };
    let reply = deps.llm.complete(&prompt).await?;
    let entries = prompt::parse_llm_output(&reply);

    tracing::info!(
        messages = messages.len(),
        components = components.len(),
        suppliers = suppliers.len(),
        entries = entries.len(),
        "digest generated"
    );

    if let Some(pool) = deps.pool {
        if let Err(e) = discussions::insert_entries(pool, &entries, chrono::Utc::now()).await {
            tracing::error!(error = %e, "failed to store discussion summaries");
        }
    }

    Ok(DigestOutcome {
        success: true,
        message: "Digest generated successfully".to_string(),
        error: None,
        message_count: messages.len(),
        component_count: components.len(),
        supplier_count: suppliers.len(),
        discussions: entries,
    })
}

/// CLI entry point for `bomd digest`.
pub async fn run_digest_cmd(
    config: &Config,
    lookback_minutes: Option<u32>,
    supplier_search: bool,
    messages_file: Option<&std::path::Path>,
) -> Result<()> {
    let lookback_minutes = lookback_minutes.unwrap_or(config.slack.lookback_minutes);
    if !(1..=1440).contains(&lookback_minutes) {
        anyhow::bail!("--lookback must be in [1, 1440]");
    }

    let source: Box<dyn MessageSource> = match messages_file {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(SlackSource::from_config(&config.slack)?),
    };
    let llm = OpenRouterClient::from_config(&config.llm)?;

    let pool = crate::db::connect(config).await?;
    let (_store, matcher) = build_matcher(config, &pool).await?;

    let result = run_digest(
        DigestRequest {
            lookback_minutes,
            supplier_search,
        },
        DigestDeps {
            matcher: &matcher,
            source: source.as_ref(),
            llm: &llm,
            pool: Some(&pool),
        },
    )
    .await;
    pool.close().await;
    let outcome = result?;

    println!("{}", outcome.message);
    if let Some(err) = &outcome.error {
        println!("  {}", err);
    }
    println!("  messages:   {}", outcome.message_count);
    println!("  components: {}", outcome.component_count);
    if supplier_search {
        println!("  suppliers:  {}", outcome.supplier_count);
    }
    for entry in &outcome.discussions {
        println!();
        if let Some(item) = &entry.item_id {
            println!("Component ID:  {}", item);
        }
        if let Some(supplier) = &entry.supplier_id {
            println!("Supplier ID:   {}", supplier);
        }
        println!("Summary:       {}", entry.summary);
        println!("Latest Update: {}", entry.latest_update);
    }
    Ok(())
}

//! TOML configuration for `bomd`.
//!
//! Only `[db]` is required. Every other section falls back to the
//! production defaults:
//!
//! ```toml
//! [db]
//! path = "./data/bomd.sqlite"
//!
//! [catalog]
//! component_table = "machine_details"
//! component_id_column = "item"
//! component_text_columns = ["name", "internal_part_name"]
//! supplier_table = "supplier_master"
//! supplier_id_column = "supplier_id"
//! supplier_text_columns = ["supplier_name", "primary_contact_name"]
//! query_timeout_secs = 30
//!
//! [matching]
//! limit = 5
//! # score_floor = 50.0
//! hierarchy_gaps = "keep"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [slack]
//! token_env = "SLACK_TOKEN"
//! # channel_id = "C0123456"
//! lookback_minutes = 500
//!
//! [llm]
//! api_key_env = "OPEN_ROUTER_API_KEY"
//! model = "tngtech/deepseek-r1t2-chimera:free"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use anyhow::{bail, Context, Result};
use bom_digest_core::aggregate::MatchOptions;
use bom_digest_core::catalog::{CatalogKind, CatalogSchema};
use bom_digest_core::hierarchy::GapPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub component_table: String,
    pub component_id_column: String,
    pub component_text_columns: Vec<String>,
    /// Base part shared by every placement of a component (impact reports).
    pub component_usage_column: String,
    pub supplier_table: String,
    pub supplier_id_column: String,
    pub supplier_text_columns: Vec<String>,
    pub query_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let components = CatalogSchema::components();
        let suppliers = CatalogSchema::suppliers();
        Self {
            component_table: components.table,
            component_id_column: components.id_column,
            component_text_columns: components.text_columns,
            component_usage_column: "child_identifier".to_string(),
            supplier_table: suppliers.table,
            supplier_id_column: suppliers.id_column,
            supplier_text_columns: suppliers.text_columns,
            query_timeout_secs: 30,
        }
    }
}

impl CatalogConfig {
    pub fn component_schema(&self) -> CatalogSchema {
        CatalogSchema {
            kind: CatalogKind::Component,
            table: self.component_table.clone(),
            id_column: self.component_id_column.clone(),
            text_columns: self.component_text_columns.clone(),
        }
    }

    pub fn supplier_schema(&self) -> CatalogSchema {
        CatalogSchema {
            kind: CatalogKind::Supplier,
            table: self.supplier_table.clone(),
            id_column: self.supplier_id_column.clone(),
            text_columns: self.supplier_text_columns.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    /// Candidates kept per keyword.
    pub limit: usize,
    pub score_floor: Option<f64>,
    pub hierarchy_gaps: GapPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            score_floor: None,
            hierarchy_gaps: GapPolicy::Keep,
        }
    }
}

impl MatchingConfig {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            limit: Some(self.limit),
            score_floor: self.score_floor,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SlackConfig {
    /// Environment variable holding the bot token.
    pub token_env: String,
    /// Falls back to the `CHANNEL_ID` environment variable.
    pub channel_id: Option<String>,
    pub lookback_minutes: u32,
    pub page_limit: u32,
    pub timeout_secs: u64,
    pub base_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token_env: "SLACK_TOKEN".to_string(),
            channel_id: None,
            lookback_minutes: 500,
            page_limit: 100,
            timeout_secs: 30,
            base_url: "https://slack.com/api".to_string(),
        }
    }
}

impl SlackConfig {
    /// The configured channel, or `CHANNEL_ID` from the environment.
    pub fn resolve_channel(&self) -> Option<String> {
        self.channel_id
            .clone()
            .or_else(|| std::env::var("CHANNEL_ID").ok())
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Sent as `HTTP-Referer`.
    pub site_url: Option<String>,
    /// Sent as `X-Title`.
    pub site_name: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPEN_ROUTER_API_KEY".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "tngtech/deepseek-r1t2-chimera:free".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
            max_retries: 3,
            site_url: None,
            site_name: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate catalog
    let catalog = &config.catalog;
    for schema in [catalog.component_schema(), catalog.supplier_schema()] {
        if schema.text_columns.is_empty() {
            bail!(
                "catalog: {} text columns must not be empty",
                schema.kind.as_str()
            );
        }
        if let Err(e) = schema.validate() {
            bail!("catalog: {}", e);
        }
    }
    if catalog.query_timeout_secs == 0 {
        bail!("catalog.query_timeout_secs must be > 0");
    }

    // Validate matching
    if config.matching.limit < 1 {
        bail!("matching.limit must be >= 1");
    }
    if let Some(floor) = config.matching.score_floor {
        if !(0.0..=100.0).contains(&floor) {
            bail!("matching.score_floor must be in [0, 100]");
        }
    }

    // Validate slack
    if !(1..=1440).contains(&config.slack.lookback_minutes) {
        bail!("slack.lookback_minutes must be in [1, 1440]");
    }
    if config.slack.page_limit == 0 {
        bail!("slack.page_limit must be > 0");
    }
    if config.slack.timeout_secs == 0 {
        bail!("slack.timeout_secs must be > 0");
    }

    // Validate llm
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }

    Ok(())
}

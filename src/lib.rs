//! # Bom Digest
//!
//! Turns manufacturing chat into a per-component digest. Messages are
//! matched against a bill-of-materials catalog (and optionally a supplier
//! catalog), the matches are widened to their ancestors, and an LLM writes
//! one summary per component. Summaries are stored in SQLite and served
//! over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐   ┌──────────┐
//! │ Slack / file│──▶│ bom-digest-core  │──▶│   LLM    │──▶│  SQLite  │
//! │  messages   │   │ match + hierarchy│   │ summaries│   │discussion│
//! └─────────────┘   └────────┬─────────┘   └──────────┘   └────┬─────┘
//!                            │ catalog                         │
//!                            ▼                                 ▼
//!                       ┌──────────┐                      ┌──────────┐
//!                       │  SQLite  │                      │   HTTP   │
//!                       │ catalogs │                      │  / CLI   │
//!                       └──────────┘                      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bomd init
//! bomd import machine_details ./data/machine_details.json
//! bomd match "the wooden screw stress test failed"
//! bomd digest --lookback 120
//! bomd serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite catalog store |
//! | [`snapshot`] | JSON catalog snapshots and import |
//! | [`match_cmd`] | `bomd match` |
//! | [`source`] | Chat message sources (Slack, file) |
//! | [`llm`] | Chat-completion client |
//! | [`prompt`] | Digest prompts and reply parsing |
//! | [`discussions`] | Stored summaries |
//! | [`digest`] | The digest pipeline |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod digest;
pub mod discussions;
pub mod llm;
pub mod match_cmd;
pub mod migrate;
pub mod prompt;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod sqlite_store;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` overrides `[logging].level`. Calling this twice is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

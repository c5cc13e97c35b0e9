//! # Bom Digest CLI (`bomd`)
//!
//! ## Usage
//!
//! ```bash
//! bomd --config ./config/bomd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bomd init` | Create the SQLite database and run schema migrations |
//! | `bomd import <table> <file>` | Upsert a JSON snapshot into a catalog table |
//! | `bomd match "<text>"...` | Match text against the catalogs |
//! | `bomd digest` | Fetch chat, summarise it, and store the digest |
//! | `bomd serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Load the component catalog
//! bomd import machine_details ./data/machine_details.json
//!
//! # Offline match against snapshots, as JSON
//! bomd match "BondBrook is late with the M10 screws" --suppliers \
//!     --components ./data/machine_details.json \
//!     --suppliers-file ./data/supplier_master.json --json
//!
//! # Digest the last two hours of a channel export
//! bomd digest --lookback 120 --messages ./messages.json
//! ```

use bom_digest::{config, digest, match_cmd, migrate, server, snapshot};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bom Digest CLI: chat-to-component digests for manufacturing teams.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bomd.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bomd",
    about = "Bom Digest: resolve manufacturing chat to catalog components and summarise it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bomd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the catalog and discussion tables. Safe to run repeatedly.
    Init,

    /// Upsert a JSON snapshot (an array of row objects) into a table.
    Import {
        /// Target table, e.g. `machine_details` or `supplier_master`.
        table: String,
        /// Snapshot file.
        file: PathBuf,
    },

    /// Match free text against the component (and supplier) catalogs.
    Match {
        /// One or more message texts.
        #[arg(required = true)]
        texts: Vec<String>,

        /// Also match against the supplier catalog.
        #[arg(long)]
        suppliers: bool,

        /// Skip the parent/child hierarchy expansion.
        #[arg(long)]
        no_expand: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        /// Match against a component snapshot instead of the database.
        #[arg(long)]
        components: Option<PathBuf>,

        /// Supplier snapshot, used with `--components`.
        #[arg(long, requires = "components")]
        suppliers_file: Option<PathBuf>,
    },

    /// Generate a digest from recent chat messages.
    Digest {
        /// Minutes of history to read (1 to 1440). Defaults to
        /// `[slack].lookback_minutes`.
        #[arg(long)]
        lookback: Option<u32>,

        /// Include suppliers in the digest.
        #[arg(long)]
        suppliers: bool,

        /// Read messages from a JSON file instead of Slack.
        #[arg(long)]
        messages: Option<PathBuf>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    bom_digest::init_logging(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { table, file } => {
            snapshot::run_import(&cfg, &table, &file).await?;
        }
        Commands::Match {
            texts,
            suppliers,
            no_expand,
            json,
            components,
            suppliers_file,
        } => {
            match_cmd::run_match(
                &cfg,
                match_cmd::MatchArgs {
                    texts: &texts,
                    supplier_search: suppliers,
                    expand: !no_expand,
                    json,
                    components_file: components.as_deref(),
                    suppliers_file: suppliers_file.as_deref(),
                },
            )
            .await?;
        }
        Commands::Digest {
            lookback,
            suppliers,
            messages,
        } => {
            digest::run_digest_cmd(&cfg, lookback, suppliers, messages.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

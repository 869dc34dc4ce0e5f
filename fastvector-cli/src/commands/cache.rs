//! Cache management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use fastvector::cache::{DiskTileStore, TileStore};
use fastvector::tile::TableRef;

use super::{config_path, load_config};
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cached bytes per table
    Stats,

    /// Delete every cached tile of one table
    Purge {
        /// Configured database name
        #[arg(long)]
        database: String,

        /// Schema name
        #[arg(long, default_value = "public")]
        schema: String,

        /// Table name
        #[arg(long)]
        table: String,
    },
}

/// Run a cache subcommand.
pub async fn run(config: Option<PathBuf>, action: CacheAction) -> Result<(), CliError> {
    let config = load_config(&config_path(config)?)?;
    let store = DiskTileStore::new(&config.cache.directory);

    match action {
        CacheAction::Stats => {
            println!("Tile cache: {}", store.root().display());
            let report = store.size_report().await?;
            if report.is_empty() {
                println!("  (empty)");
                return Ok(());
            }
            let width = report.keys().map(String::len).max().unwrap_or(0);
            let mut total = 0u64;
            for (table, bytes) in &report {
                println!("  {table:<width$}  {}", format_bytes(*bytes));
                total += bytes;
            }
            println!("  {:<width$}  {}", "total", format_bytes(total));
            Ok(())
        }
        CacheAction::Purge {
            database,
            schema,
            table,
        } => {
            let table = TableRef::new(&database, &schema, &table)?;
            let dir = store.table_dir(&table);
            if store.purge(&table).await? {
                println!("Deleted {}", dir.display());
            } else {
                println!("No cache at {}", table.cache_dir_name());
            }
            Ok(())
        }
    }
}

/// Human-readable byte count using decimal units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for u in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = u;
    }
    format!("{value:.1} {unit}")
}

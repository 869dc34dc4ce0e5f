//! fastvector - serve PostGIS tables as Mapbox vector tiles.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigAction;

#[derive(Debug, Parser)]
#[command(name = "fastvector", version, about)]
struct Cli {
    /// Path to config.ini (default: ~/.config/fastvector/config.ini)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the tile server
    Serve {
        /// Listen address, overriding [server] bind
        #[arg(long)]
        bind: Option<String>,
    },

    /// Inspect or clear the tile cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { bind } => commands::serve::run(cli.config, bind).await,
        Commands::Cache { action } => commands::cache::run(cli.config, action).await,
        Commands::Config { action } => commands::config::run(cli.config, action),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_purge() {
        let cli = Cli::try_parse_from([
            "fastvector",
            "--config",
            "/tmp/c.ini",
            "cache",
            "purge",
            "--database",
            "data",
            "--schema",
            "public",
            "--table",
            "parks",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.ini")));
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Purge { .. }
            }
        ));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["fastvector", "serve", "--config", "c.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.ini")));
    }
}

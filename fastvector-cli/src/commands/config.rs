//! Configuration CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use fastvector::config::ConfigFile;

use super::{config_path, load_config};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and print the effective settings
    Check,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(config: Option<PathBuf>, action: ConfigAction) -> Result<(), CliError> {
    let path = config_path(config)?;
    match action {
        ConfigAction::Check => {
            let config = load_config(&path)?;
            println!("{} is valid", path.display());
            println!();
            print_summary(&config);
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn print_summary(config: &ConfigFile) {
    println!("[server]");
    println!("  bind = {}", config.server.bind);
    println!("[cache]");
    println!("  directory = {}", config.cache.directory.display());
    println!("[logging]");
    println!("  level = {}", config.logging.level);
    match &config.logging.directory {
        Some(dir) => println!("  directory = {}", dir.display()),
        None => println!("  directory = (console only)"),
    }

    for db in &config.databases {
        println!("[database.{}]", db.name);
        println!("  host = {}", db.connection.host);
        println!("  port = {}", db.connection.port);
        println!("  username = {}", db.connection.username);
        println!(
            "  password = {}",
            if db.connection.password.is_some() { "(set)" } else { "(not set)" }
        );
        println!("  database = {}", db.connection.dbname);
        println!("  pool_size = {}", db.connection.pool_size);
        println!("  query_timeout_secs = {}", db.connection.query_timeout.as_secs());
        println!("  cache_age_in_seconds = {}", db.tiles.cache_age_in_seconds);
        println!("  max_features_per_tile = {}", db.tiles.max_features_per_tile);
        println!("  geometry_column = {}", db.tiles.geometry_column);
    }
}

//! Serve command - run the HTTP tile server until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use fastvector::cache::DiskTileStore;
use fastvector::db::DatabaseRegistry;
use fastvector::logging::init_logging;
use fastvector::server::{self, AppState};
use fastvector::service::TileService;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::{config_path, load_config};
use crate::error::CliError;

/// Run the serve command.
pub async fn run(config: Option<PathBuf>, bind: Option<String>) -> Result<(), CliError> {
    let path = config_path(config)?;
    let config = load_config(&path)?;
    let _log_guard = init_logging(&config.logging)?;

    let addr: SocketAddr = match bind {
        Some(raw) => raw
            .parse()
            .map_err(|e| CliError::Invalid(format!("invalid --bind '{raw}': {e}")))?,
        None => config.server.bind,
    };

    if config.databases.is_empty() {
        warn!(config = %path.display(), "No [database.*] sections configured; every tile request will 404");
    }

    println!("FastVector v{}", fastvector::VERSION);
    println!("==================");
    println!();
    println!("Config:    {}", path.display());
    println!("Cache:     {}", config.cache.directory.display());
    for db in &config.databases {
        println!(
            "Database:  {} -> {}@{}:{}/{} (max-age {}s)",
            db.name,
            db.connection.username,
            db.connection.host,
            db.connection.port,
            db.connection.dbname,
            db.tiles.cache_age_in_seconds
        );
    }
    println!();

    let registry = DatabaseRegistry::connect(&config.databases)?;
    let store = Arc::new(DiskTileStore::new(&config.cache.directory));
    let service = TileService::new(registry, store);
    let metrics = Arc::clone(service.metrics());

    let listener = TcpListener::bind(addr).await.map_err(|source| CliError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    println!("Listening on http://{addr}");
    println!("Press Ctrl+C to stop");
    println!();

    server::serve(listener, AppState::new(service), shutdown_signal())
        .await
        .map_err(CliError::Serve)?;

    let summary = metrics.snapshot();
    info!(
        tiles_served = summary.tiles_served,
        cache_hits = summary.cache_hits,
        cache_misses = summary.cache_misses,
        "Server stopped"
    );
    println!();
    println!("Session Summary");
    println!("---------------");
    println!("  {summary}");
    println!("  Uptime: {}s", summary.uptime_secs);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed.
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!();
    println!("Received shutdown signal, draining connections...");
}

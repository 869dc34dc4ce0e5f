//! Registry of configured databases.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::{DatabaseConfig, TileSettings};
use crate::tile::Identifier;

use super::{DatabaseError, PgDatabase, SpatialDatabase};

/// One configured database: its pool and its tile settings.
#[derive(Clone)]
pub struct DatabaseHandle {
    settings: TileSettings,
    database: Arc<dyn SpatialDatabase>,
}

impl DatabaseHandle {
    pub fn new(settings: TileSettings, database: Arc<dyn SpatialDatabase>) -> Self {
        Self { settings, database }
    }

    pub fn settings(&self) -> &TileSettings {
        &self.settings
    }

    pub fn database(&self) -> &dyn SpatialDatabase {
        self.database.as_ref()
    }
}

/// Databases addressable by name in tile URLs.
///
/// Built once at startup and passed to the orchestrator; tests register
/// fake databases instead of pools.
#[derive(Clone, Default)]
pub struct DatabaseRegistry {
    databases: BTreeMap<Identifier, DatabaseHandle>,
}

impl DatabaseRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a PostgreSQL pool for every configured database.
    pub fn connect(configs: &[DatabaseConfig]) -> Result<Self, DatabaseError> {
        let mut registry = Self::new();
        for config in configs {
            let database = PgDatabase::connect(config)?;
            registry.register(config.name.clone(), config.tiles.clone(), Arc::new(database));
        }
        info!(databases = registry.len(), "Database registry ready");
        Ok(registry)
    }

    /// Add or replace a database.
    pub fn register(
        &mut self,
        name: Identifier,
        settings: TileSettings,
        database: Arc<dyn SpatialDatabase>,
    ) {
        self.databases
            .insert(name, DatabaseHandle::new(settings, database));
    }

    /// Look up a database by name.
    pub fn get(&self, name: &Identifier) -> Option<&DatabaseHandle> {
        self.databases.get(name)
    }

    /// Databases in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &DatabaseHandle)> {
        self.databases.iter()
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

//! Configuration file handling.
//!
//! FastVector reads a single INI file. Example:
//!
//! ```ini
//! [server]
//! bind = 0.0.0.0:8000
//!
//! [cache]
//! directory = ./cache
//!
//! [logging]
//! level = info
//! directory = ./logs
//!
//! [database.data]
//! host = localhost
//! port = 5432
//! username = postgres
//! password = postgres
//! cache_age_in_seconds = 6000
//! max_features_per_tile = 100000
//! ```
//!
//! Every `[database.<name>]` section registers one database; `<name>` is
//! the first path segment of tile URLs and, unless `database` overrides it,
//! also the PostgreSQL database name.

mod error;

pub use error::ConfigError;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use crate::tile::Identifier;

/// Prefix of per-database section names.
pub const DATABASE_SECTION_PREFIX: &str = "database.";

/// Default HTTP bind address, `0.0.0.0:8000`.
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);

/// Default tile cache retention advertised via `Cache-Control`.
pub const DEFAULT_CACHE_AGE_SECS: u64 = 6000;

/// Default row cap per tile.
pub const DEFAULT_MAX_FEATURES_PER_TILE: u32 = 100_000;

/// Default geometry column name.
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geom";

/// Default number of pooled connections per database.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default query timeout (3 minutes).
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 180;

/// Parsed configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root of the tile cache hierarchy.
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// One `[database.<name>]` section.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub name: Identifier,
    pub connection: ConnectionConfig,
    pub tiles: TileSettings,
}

/// How to reach the database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub dbname: String,
    pub pool_size: usize,
    pub query_timeout: Duration,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("dbname", &self.dbname)
            .field("pool_size", &self.pool_size)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Per-database tile settings consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSettings {
    /// Advertised `Cache-Control: max-age`; `0` disables the tile cache.
    pub cache_age_in_seconds: u64,
    /// `LIMIT` applied to every tile query.
    pub max_features_per_tile: u32,
    /// Geometry column of every served table.
    pub geometry_column: Identifier,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            cache_age_in_seconds: DEFAULT_CACHE_AGE_SECS,
            max_features_per_tile: DEFAULT_MAX_FEATURES_PER_TILE,
            geometry_column: Identifier::parse(DEFAULT_GEOMETRY_COLUMN)
                .expect("default geometry column is a valid identifier"),
        }
    }
}

impl TileSettings {
    /// Whether tiles of this database may be cached at all.
    pub fn caching_enabled(&self) -> bool {
        self.cache_age_in_seconds > 0
    }
}

impl ConfigFile {
    /// Default configuration path: `~/.config/fastvector/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fastvector").join("config.ini"))
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let server = ServerConfig {
            bind: parse_or(ini.section(Some("server")), "server", "bind", DEFAULT_BIND)?,
        };

        let cache = CacheConfig {
            directory: ini
                .section(Some("cache"))
                .and_then(|s| s.get("directory"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cache")),
        };

        let logging_section = ini.section(Some("logging"));
        let logging = LoggingConfig {
            level: logging_section
                .and_then(|s| s.get("level"))
                .unwrap_or("info")
                .to_string(),
            directory: logging_section
                .and_then(|s| s.get("directory"))
                .map(PathBuf::from),
        };

        let mut databases = Vec::new();
        for (section, properties) in ini.iter() {
            let Some(section) = section else { continue };
            let Some(name) = section.strip_prefix(DATABASE_SECTION_PREFIX) else {
                continue;
            };
            databases.push(parse_database(section, name, properties)?);
        }

        Ok(Self {
            server,
            cache,
            logging,
            databases,
        })
    }

    /// Look up a database section by name.
    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|db| db.name.as_str() == name)
    }
}

fn parse_database(
    section: &str,
    name: &str,
    properties: &Properties,
) -> Result<DatabaseConfig, ConfigError> {
    let name = Identifier::parse(name).map_err(|e| ConfigError::InvalidValue {
        section: section.to_string(),
        key: "name".to_string(),
        value: name.to_string(),
        reason: e.to_string(),
    })?;
    let props = Some(properties);

    let pool_size: usize = parse_or(props, section, "pool_size", DEFAULT_POOL_SIZE)?;
    if pool_size == 0 {
        return Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: "pool_size".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let max_features_per_tile: u32 = parse_or(
        props,
        section,
        "max_features_per_tile",
        DEFAULT_MAX_FEATURES_PER_TILE,
    )?;
    if max_features_per_tile == 0 {
        return Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: "max_features_per_tile".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let geometry_column = properties
        .get("geometry_column")
        .unwrap_or(DEFAULT_GEOMETRY_COLUMN);
    let geometry_column =
        Identifier::parse(geometry_column).map_err(|e| ConfigError::InvalidValue {
            section: section.to_string(),
            key: "geometry_column".to_string(),
            value: geometry_column.to_string(),
            reason: e.to_string(),
        })?;

    let connection = ConnectionConfig {
        host: properties.get("host").unwrap_or("localhost").to_string(),
        port: parse_or(props, section, "port", 5432u16)?,
        username: properties.get("username").unwrap_or("postgres").to_string(),
        password: properties.get("password").map(str::to_string),
        dbname: properties
            .get("database")
            .unwrap_or(name.as_str())
            .to_string(),
        pool_size,
        query_timeout: Duration::from_secs(parse_or(
            props,
            section,
            "query_timeout_secs",
            DEFAULT_QUERY_TIMEOUT_SECS,
        )?),
    };

    let tiles = TileSettings {
        cache_age_in_seconds: parse_or(
            props,
            section,
            "cache_age_in_seconds",
            DEFAULT_CACHE_AGE_SECS,
        )?,
        max_features_per_tile,
        geometry_column,
    };

    Ok(DatabaseConfig {
        name,
        connection,
        tiles,
    })
}

/// Parse `key` from `properties`, falling back to `default` when absent.
fn parse_or<T>(
    properties: Option<&Properties>,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = properties.and_then(|p| p.get(key)) else {
        return Ok(default);
    };
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[server]
bind = 127.0.0.1:9000

[cache]
directory = /var/cache/fastvector

[logging]
level = debug
directory = /var/log/fastvector

[database.data]
host = db.internal
port = 5433
username = tiles
password = secret
cache_age_in_seconds = 60
max_features_per_tile = 5000
geometry_column = the_geom
pool_size = 4
query_timeout_secs = 30

[database.archive]
database = archive_2020
cache_age_in_seconds = 0
"#;

    #[test]
    fn test_full_config() {
        let config = ConfigFile::from_ini_str(FULL).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.cache.directory, PathBuf::from("/var/cache/fastvector"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.directory,
            Some(PathBuf::from("/var/log/fastvector"))
        );
        assert_eq!(config.databases.len(), 2);

        let data = config.database("data").unwrap();
        assert_eq!(data.connection.host, "db.internal");
        assert_eq!(data.connection.port, 5433);
        assert_eq!(data.connection.username, "tiles");
        assert_eq!(data.connection.password.as_deref(), Some("secret"));
        assert_eq!(data.connection.dbname, "data");
        assert_eq!(data.connection.pool_size, 4);
        assert_eq!(data.connection.query_timeout, Duration::from_secs(30));
        assert_eq!(data.tiles.cache_age_in_seconds, 60);
        assert_eq!(data.tiles.max_features_per_tile, 5000);
        assert_eq!(data.tiles.geometry_column.as_str(), "the_geom");

        let archive = config.database("archive").unwrap();
        assert_eq!(archive.connection.dbname, "archive_2020");
        assert!(!archive.tiles.caching_enabled());
    }

    #[test]
    fn test_defaults() {
        let config = ConfigFile::from_ini_str("[database.data]\n").unwrap();
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.cache.directory, PathBuf::from("cache"));
        assert_eq!(config.logging, LoggingConfig::default());

        let data = &config.databases[0];
        assert_eq!(data.connection.host, "localhost");
        assert_eq!(data.connection.port, 5432);
        assert_eq!(data.connection.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(data.tiles, TileSettings::default());
    }

    #[test]
    fn test_invalid_number_is_reported_with_location() {
        let err = ConfigFile::from_ini_str("[database.data]\nmax_features_per_tile = lots\n")
            .unwrap_err();
        match err {
            ConfigError::InvalidValue {
                section, key, value, ..
            } => {
                assert_eq!(section, "database.data");
                assert_eq!(key, "max_features_per_tile");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_row_cap_is_rejected() {
        let err = ConfigFile::from_ini_str("[database.data]\nmax_features_per_tile = 0\n");
        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_invalid_database_name() {
        let err = ConfigFile::from_ini_str("[database.my-db]\n");
        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let config = ConfigFile::from_ini_str(FULL).unwrap();
        let debug = format!("{:?}", config.database("data").unwrap().connection);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load(Path::new("/nonexistent/fastvector.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

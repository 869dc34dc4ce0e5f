//! PostgreSQL implementation of [`SpatialDatabase`] on a deadpool pool.

use std::time::Duration;

use deadpool_postgres::{ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use futures::future::BoxFuture;
use tokio_postgres::types::ToSql;
use tokio_postgres::{CancelToken, NoTls};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::query::{SqlStatement, SqlValue};

use super::{DatabaseError, DbRow, SpatialDatabase};

/// A PostGIS database behind a bounded connection pool.
///
/// Acquiring a connection waits (up to the configured query timeout) when
/// every connection is busy. The same timeout is set as the session's
/// `statement_timeout`, so a runaway tile query is aborted server-side.
pub struct PgDatabase {
    name: String,
    pool: Pool,
}

impl PgDatabase {
    /// Build the pool for one configured database.
    ///
    /// Connections are opened lazily on first use, so this does not fail
    /// when the server is down.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let connection = &config.connection;
        let timeout_ms = connection.query_timeout.as_millis();

        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = Some(connection.host.clone());
        cfg.port = Some(connection.port);
        cfg.user = Some(connection.username.clone());
        cfg.password = connection.password.clone();
        cfg.dbname = Some(connection.dbname.clone());
        cfg.application_name = Some("fastvector".to_string());
        cfg.options = Some(format!("-c statement_timeout={timeout_ms}"));
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: connection.pool_size,
            timeouts: Timeouts {
                wait: Some(connection.query_timeout),
                create: Some(Duration::from_secs(30)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..PoolConfig::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Config(e.to_string()))?;

        debug!(
            database = %config.name,
            host = %connection.host,
            port = connection.port,
            pool_size = connection.pool_size,
            "Created connection pool"
        );

        Ok(Self {
            name: config.name.to_string(),
            pool,
        })
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        self.pool.get().await.map_err(|e| {
            warn!(database = %self.name, error = %e, "Failed to acquire connection");
            DatabaseError::Pool(e.to_string())
        })
    }
}

impl SpatialDatabase for PgDatabase {
    fn fetch_blob<'a>(
        &'a self,
        statement: &'a SqlStatement,
    ) -> BoxFuture<'a, Result<Vec<u8>, DatabaseError>> {
        Box::pin(async move {
            let client = self.client().await?;
            let params = bind_params(&statement.params);

            let guard = CancelOnDrop::new(client.cancel_token());
            let result = client.query_one(statement.sql.as_str(), &params).await;
            guard.disarm();
            let row = result.map_err(|e| DatabaseError::Query(e.to_string()))?;

            let blob: Option<Vec<u8>> = row
                .try_get(0)
                .map_err(|e| DatabaseError::Decode(e.to_string()))?;
            Ok(blob.unwrap_or_default())
        })
    }

    fn fetch_rows<'a>(
        &'a self,
        statement: &'a SqlStatement,
    ) -> BoxFuture<'a, Result<Vec<DbRow>, DatabaseError>> {
        Box::pin(async move {
            let client = self.client().await?;
            let params = bind_params(&statement.params);

            let guard = CancelOnDrop::new(client.cancel_token());
            let result = client.query(statement.sql.as_str(), &params).await;
            guard.disarm();
            let rows = result.map_err(|e| DatabaseError::Query(e.to_string()))?;

            rows.iter()
                .map(|row| {
                    (0..row.len())
                        .map(|i| row.try_get::<_, Option<String>>(i))
                        .collect::<Result<DbRow, _>>()
                        .map_err(|e| DatabaseError::Decode(e.to_string()))
                })
                .collect()
        })
    }
}

fn bind_params(values: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    values
        .iter()
        .map(|value| -> &(dyn ToSql + Sync) {
            match value {
                SqlValue::Int(v) => v,
                SqlValue::Float(v) => v,
                SqlValue::Text(v) => v,
                SqlValue::Bool(v) => v,
            }
        })
        .collect()
}

/// Cancels the in-flight query if the request future is dropped.
///
/// Dropping a tokio-postgres future only stops waiting for the result; the
/// server keeps executing. When the HTTP client disconnects mid-tile, this
/// guard sends PostgreSQL's out-of-band cancel request instead.
struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    fn new(token: CancelToken) -> Self {
        Self { token: Some(token) }
    }

    /// The query finished; nothing to cancel.
    fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                match token.cancel_query(NoTls).await {
                    Ok(()) => debug!("Cancelled abandoned query"),
                    Err(e) => warn!(error = %e, "Failed to cancel abandoned query"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_params_preserves_order_and_count() {
        let values = vec![
            SqlValue::Int(1),
            SqlValue::Text("a".to_string()),
            SqlValue::Float(2.5),
            SqlValue::Bool(false),
        ];
        assert_eq!(bind_params(&values).len(), 4);
    }

    #[tokio::test]
    async fn test_connect_does_not_require_a_live_server() {
        let ini = "[database.data]\nhost = 127.0.0.1\nport = 1\n";
        let config = crate::config::ConfigFile::from_ini_str(ini).unwrap();
        let db = PgDatabase::connect(&config.databases[0]).unwrap();
        assert_eq!(db.name, "data");
    }
}

//! Database access.
//!
//! The tile pipeline needs exactly two things from the spatial database:
//! one scalar blob for a statement (the encoded tile) and a set of rows
//! for a statement (catalog lookups). [`SpatialDatabase`] captures that
//! contract so the orchestrator can run against PostgreSQL in production
//! and against a fake in tests.
//!
//! Connection pools are not ambient state: a [`DatabaseRegistry`] maps
//! each configured database name to its pool and tile settings, and is
//! handed to the orchestrator explicitly.

mod postgres;
mod registry;

pub use postgres::PgDatabase;
pub use registry::{DatabaseHandle, DatabaseRegistry};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::query::SqlStatement;

/// One result row, every column decoded as optional text.
///
/// Catalog statements cast their output columns to `text`, which keeps
/// the trait independent of driver row types.
pub type DbRow = Vec<Option<String>>;

/// Errors talking to the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// The pool could not be built from configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// No connection could be acquired (pool exhausted past its timeout,
    /// or the server is unreachable).
    #[error("could not acquire a database connection: {0}")]
    Pool(String),

    /// The server rejected or failed to execute the statement.
    #[error("query failed: {0}")]
    Query(String),

    /// The statement ran but the result could not be decoded.
    #[error("unexpected result shape: {0}")]
    Decode(String),
}

/// A pooled spatial database.
///
/// Implementations must be cheap to share across tasks (`Send + Sync`) and
/// must not block the runtime while waiting for a connection or a result.
pub trait SpatialDatabase: Send + Sync {
    /// Execute `statement` and return the single `bytea` value it produces.
    ///
    /// A `NULL` result is returned as an empty blob.
    fn fetch_blob<'a>(
        &'a self,
        statement: &'a SqlStatement,
    ) -> BoxFuture<'a, Result<Vec<u8>, DatabaseError>>;

    /// Execute `statement` and return every row.
    fn fetch_rows<'a>(
        &'a self,
        statement: &'a SqlStatement,
    ) -> BoxFuture<'a, Result<Vec<DbRow>, DatabaseError>>;
}

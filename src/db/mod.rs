//! Database abstraction layer for dblink.
//!
//! Provides the trait boundary between the query executor and the driver:
//! a connection pool with bounded-wait acquisition and explicit-handle
//! release, and the connection/statement/cursor chain the executor drives.
//! Different database backends implement these traits interchangeably.

mod mock;
mod postgres;
mod types;

pub use mock::{FailureMode, MockColumn, MockPool, MockResult};
pub use postgres::PostgresPoolManager;
pub use types::Value;

use crate::config::{DataSourceConfig, ExecutorOptions};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    // Future: MySQL, SQLite, etc.
}

impl DatabaseBackend {
    /// Returns the backend as a string for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }
}

/// Creates a connection pool for the backend named in the data source.
///
/// This is the central factory function for pool construction. Physical
/// pools are created lazily on first acquire for each data source.
pub fn open_pool(source: &DataSourceConfig, options: &ExecutorOptions) -> Arc<dyn ConnectionPool> {
    match source.backend {
        DatabaseBackend::Postgres => Arc::new(PostgresPoolManager::new(*options)),
    }
}

/// The shared connection pool boundary.
///
/// `acquire` waits at most `timeout` for a free connection and fails with
/// a pool acquisition error afterwards. `release` takes the connection
/// handle back explicitly; it must be safe to call exactly once per
/// successful acquire regardless of what happened in between.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Borrows a connection to the given data source, waiting at most `timeout`.
    async fn acquire(
        &self,
        source: &DataSourceConfig,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>>;

    /// Returns a borrowed connection to the pool.
    async fn release(&self, conn: Box<dyn Connection>) -> Result<()>;
}

/// A borrowed connection, exclusively owned by one invocation.
#[async_trait]
pub trait Connection: Send {
    /// Prepares a statement for execution on this connection.
    async fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Statement + 'a>>;
}

/// A prepared statement bound to a borrowed connection.
#[async_trait]
pub trait Statement: Send {
    /// Executes the statement, binding `params` positionally in order.
    async fn execute<'a>(&'a mut self, params: &'a [Value]) -> Result<Box<dyn Cursor + 'a>>;

    /// Releases driver resources held by the statement.
    async fn close(&mut self) -> Result<()>;
}

/// A live, forward-only handle over a query's result rows.
///
/// Column metadata is available for the whole lifetime of the cursor,
/// including before the first row and for empty result sets. Vendor type
/// names are reported raw; normalization happens above this boundary.
#[async_trait]
pub trait Cursor: Send {
    /// Number of columns in the result shape.
    fn column_count(&self) -> usize;

    /// The driver-reported label for the column at `index` (0-based).
    fn column_label(&self, index: usize) -> Result<String>;

    /// The raw vendor type name for the column at `index` (0-based).
    ///
    /// Callers re-read this during row iteration so that drivers which
    /// vary the reported type per row binding still convert correctly.
    fn column_type_name(&self, index: usize) -> Result<String>;

    /// Advances to the next row, returning its raw driver values.
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Releases driver resources held by the cursor.
    async fn close(&mut self) -> Result<()>;
}

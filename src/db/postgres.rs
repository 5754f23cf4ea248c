//! PostgreSQL connection pool implementation.
//!
//! Provides `PostgresPoolManager`, which implements the `ConnectionPool`
//! trait on top of sqlx. Physical pools are created lazily, one per data
//! source, and connections are handed to the executor as the generic
//! connection/statement/cursor chain.

use crate::config::{DataSourceConfig, ExecutorOptions};
use crate::db::{Connection, ConnectionPool, Cursor, Statement, Value};
use crate::error::{DbLinkError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{
    Column as SqlxColumn, Executor, Postgres, Row as SqlxRow, Statement as SqlxStatement, TypeInfo,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of pool creation retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Connection pool manager for PostgreSQL data sources.
///
/// Keeps one sqlx pool per distinct connection string, created on first
/// acquire. Connections release back to their pool on return.
#[derive(Debug)]
pub struct PostgresPoolManager {
    options: ExecutorOptions,
    pools: tokio::sync::Mutex<HashMap<String, PgPool>>,
}

impl PostgresPoolManager {
    /// Creates a new pool manager with the given options.
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options,
            pools: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pool for the given data source, creating it if needed.
    async fn pool_for(&self, source: &DataSourceConfig) -> Result<PgPool> {
        let conn_str = source.to_connection_string()?;

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&conn_str) {
            return Ok(pool.clone());
        }

        let pool = create_pool(&conn_str, &self.options, source).await?;
        pools.insert(conn_str, pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl ConnectionPool for PostgresPoolManager {
    async fn acquire(
        &self,
        source: &DataSourceConfig,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>> {
        let pool = self.pool_for(source).await?;

        let conn = tokio::time::timeout(timeout, pool.acquire())
            .await
            .map_err(|_| {
                DbLinkError::pool_acquisition(format!(
                    "No connection available for {} within {}ms",
                    source.display_string(),
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| map_connection_error(e, source))?;

        Ok(Box::new(PgPooledConnection { inner: conn }))
    }

    async fn release(&self, conn: Box<dyn Connection>) -> Result<()> {
        // sqlx returns the underlying connection to its pool on drop.
        drop(conn);
        Ok(())
    }
}

/// Establishes a new sqlx pool, retrying transient failures with backoff.
async fn create_pool(
    conn_str: &str,
    options: &ExecutorOptions,
    source: &DataSourceConfig,
) -> Result<PgPool> {
    let mut last_error = None;
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        debug!("Pool creation attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

        let result = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .connect(conn_str)
            .await;

        match result {
            Ok(pool) => {
                debug!("Successfully connected to {}", source.display_string());
                return Ok(pool);
            }
            Err(e) => {
                let is_transient = is_transient_error(&e);
                last_error = Some(e);

                if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                    warn!(
                        "Pool creation attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                }
            }
        }
    }

    // All retries exhausted
    Err(map_connection_error(
        last_error.expect("at least one attempt was made"),
        source,
    ))
}

/// A pooled PostgreSQL connection borrowed by one executor invocation.
struct PgPooledConnection {
    inner: sqlx::pool::PoolConnection<Postgres>,
}

#[async_trait]
impl Connection for PgPooledConnection {
    async fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Statement + 'a>> {
        let prepared = (&mut *self.inner)
            .prepare(sql)
            .await
            .map_err(|e| DbLinkError::execution(sql, format_query_error(e)))?;

        let columns: Vec<PgColumnMeta> = prepared
            .columns()
            .iter()
            .map(|col| PgColumnMeta {
                name: col.name().to_string(),
                type_name: col.type_info().name().to_string(),
            })
            .collect();

        Ok(Box::new(PgPreparedStatement {
            conn: &mut self.inner,
            sql: sql.to_string(),
            columns,
        }))
    }
}

/// Column shape captured at prepare time.
#[derive(Debug, Clone)]
struct PgColumnMeta {
    name: String,
    type_name: String,
}

/// A prepared statement on a borrowed connection.
struct PgPreparedStatement<'c> {
    conn: &'c mut sqlx::pool::PoolConnection<Postgres>,
    sql: String,
    columns: Vec<PgColumnMeta>,
}

#[async_trait]
impl Statement for PgPreparedStatement<'_> {
    async fn execute<'a>(&'a mut self, params: &'a [Value]) -> Result<Box<dyn Cursor + 'a>> {
        let mut query = sqlx::query(self.sql.as_str());
        for param in params {
            query = bind_value(query, param);
        }

        let stream = (&mut **self.conn).fetch(query);

        Ok(Box::new(PgCursor {
            sql: self.sql.clone(),
            columns: self.columns.clone(),
            stream,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        // Prepared statements live in the connection's statement cache;
        // there is nothing to free per invocation.
        Ok(())
    }
}

/// Binds one parameter value positionally.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
    }
}

/// Forward-only cursor over a PostgreSQL row stream.
struct PgCursor<'a> {
    sql: String,
    columns: Vec<PgColumnMeta>,
    stream: BoxStream<'a, sqlx::Result<PgRow>>,
}

#[async_trait]
impl Cursor for PgCursor<'_> {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_label(&self, index: usize) -> Result<String> {
        self.columns
            .get(index)
            .map(|col| col.name.clone())
            .ok_or_else(|| DbLinkError::metadata(format!("No column at index {index}")))
    }

    fn column_type_name(&self, index: usize) -> Result<String> {
        self.columns
            .get(index)
            .map(|col| col.type_name.clone())
            .ok_or_else(|| DbLinkError::metadata(format!("No column at index {index}")))
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        match self.stream.try_next().await {
            Ok(Some(row)) => Ok(Some(convert_row(&row))),
            Ok(None) => Ok(None),
            Err(e) => Err(DbLinkError::execution(
                self.sql.clone(),
                format_query_error(e),
            )),
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stream ends the fetch; the connection drains any
        // remaining portal state when it is next used or released.
        Ok(())
    }
}

/// Converts a sqlx PgRow to a vector of raw values.
fn convert_row(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    // Try to get the value based on the type
    // We use a match on type name and try to decode appropriately
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    // Connection refused or timeout are often transient
    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    // Authentication and database-not-found errors are not transient
    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    // Default to not retrying unknown errors
    false
}

/// Maps sqlx connection errors to user-friendly acquisition failures.
fn map_connection_error(error: sqlx::Error, source: &DataSourceConfig) -> DbLinkError {
    let host = source.host.as_deref().unwrap_or("localhost");
    let port = source.port;
    let user = source.user.as_deref().unwrap_or("unknown");
    let database = source.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        DbLinkError::pool_acquisition(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        DbLinkError::pool_acquisition(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        DbLinkError::pool_acquisition(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        DbLinkError::pool_acquisition(
            "Server requires SSL. Add '?sslmode=require' to connection string.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        DbLinkError::pool_acquisition(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        DbLinkError::pool_acquisition(error.to_string())
    }
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let error_str = error.to_string();

    // Parse PostgreSQL error format to extract useful information
    // PostgreSQL errors often have format: "ERROR: message\nDETAIL: ...\nHINT: ..."
    let mut result = String::new();

    // Extract the main error message
    if let Some(db_error) = error.as_database_error() {
        result.push_str("ERROR: ");
        result.push_str(db_error.message());

        // Try to downcast to PgDatabaseError for Postgres-specific fields
        if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
            // Add detail if available
            if let Some(detail) = pg_error.detail() {
                result.push_str("\n  DETAIL: ");
                result.push_str(detail);
            }

            // Add hint if available
            if let Some(hint) = pg_error.hint() {
                result.push_str("\n  HINT: ");
                result.push_str(hint);
            }

            if let Some(table) = pg_error.table() {
                result.push_str("\n  TABLE: ");
                result.push_str(table);
            }

            if let Some(column) = pg_error.column() {
                result.push_str("\n  COLUMN: ");
                result.push_str(column);
            }

            if let Some(constraint) = pg_error.constraint() {
                result.push_str("\n  CONSTRAINT: ");
                result.push_str(constraint);
            }
        }
    } else {
        // Fallback for non-database errors
        result = error_str;
    }

    result
}

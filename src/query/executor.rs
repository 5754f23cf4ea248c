//! Query execution pipeline.
//!
//! `QueryExecutor` owns the acquire → prepare → bind → execute →
//! materialize → release sequence against the pool boundary. Results are
//! interpreted by a `ResultConsumer`, either the default table builder or
//! a caller-supplied consumer running against the live cursor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{DataSourceConfig, ExecutorOptions};
use crate::db::{Connection, ConnectionPool, Cursor, Statement};
use crate::error::{DbLinkError, Result};
use crate::normalize::normalize_value;
use crate::observe::{QueryObserver, TracingObserver};
use crate::query::BoundSql;
use crate::table::{ColumnMetadata, ColumnMetadataSet, RowData, TableData};
use async_trait::async_trait;

/// Interprets a live cursor into a result of type `R`.
///
/// The consumer runs while the cursor is open, before any resource
/// release, and must not retain the cursor beyond its own return.
#[async_trait]
pub trait ResultConsumer<R>: Send + Sync {
    async fn consume(&self, cursor: &mut dyn Cursor) -> Result<R>;
}

/// Executes bound statements against one data source through a shared
/// connection pool.
///
/// Each invocation is independent: it borrows its own connection and
/// exclusively owns the statement and cursor until release.
pub struct QueryExecutor {
    pool: Arc<dyn ConnectionPool>,
    source: DataSourceConfig,
    options: ExecutorOptions,
    observer: Arc<dyn QueryObserver>,
}

impl QueryExecutor {
    /// Creates an executor with default options and tracing observability.
    pub fn new(pool: Arc<dyn ConnectionPool>, source: DataSourceConfig) -> Self {
        Self {
            pool,
            source,
            options: ExecutorOptions::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Overrides the executor options (acquire timeout, pool sizing).
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the observability sink.
    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The data source this executor runs against.
    pub fn source(&self) -> &DataSourceConfig {
        &self.source
    }

    /// Executes the statement and materializes the full result table.
    pub async fn query_table(&self, bound: &BoundSql) -> Result<TableData> {
        let builder = TableBuilder::new(Arc::clone(&self.observer));
        self.query_with(bound, &builder).await
    }

    /// Executes the statement purely to introspect its result shape.
    ///
    /// The statement is fully executed; only cursor metadata is read.
    pub async fn column_metadata(&self, bound: &BoundSql) -> Result<ColumnMetadataSet> {
        self.query_with(bound, &HeaderReader).await
    }

    /// Executes the statement and hands the live cursor to `consumer`.
    ///
    /// Regardless of outcome, the cursor is closed before the statement
    /// and the statement before the connection returns to the pool. A
    /// release failure never masks a primary error; with no primary
    /// error it becomes the reported error.
    pub async fn query_with<R>(
        &self,
        bound: &BoundSql,
        consumer: &dyn ResultConsumer<R>,
    ) -> Result<R> {
        let mut conn = self
            .pool
            .acquire(&self.source, self.options.acquire_timeout())
            .await?;

        let outcome = self.run_statement(conn.as_mut(), bound, consumer).await;
        let released = self.pool.release(conn).await;
        settle(outcome, released, &*self.observer)
    }

    async fn run_statement<R>(
        &self,
        conn: &mut dyn Connection,
        bound: &BoundSql,
        consumer: &dyn ResultConsumer<R>,
    ) -> Result<R> {
        self.observer.query_started(&bound.sql);

        let mut stmt = conn.prepare(&bound.sql).await?;
        let outcome = run_cursor(stmt.as_mut(), bound, consumer, &*self.observer).await;
        let closed = stmt.close().await;
        settle(outcome, closed, &*self.observer)
    }
}

async fn run_cursor<R>(
    stmt: &mut dyn Statement,
    bound: &BoundSql,
    consumer: &dyn ResultConsumer<R>,
    observer: &dyn QueryObserver,
) -> Result<R> {
    let started = Instant::now();
    let mut cursor = stmt.execute(&bound.params).await?;
    observer.query_executed(&bound.sql, started.elapsed());

    let consumed = consumer.consume(cursor.as_mut()).await;
    let closed = cursor.close().await;
    settle(consumed, closed, observer)
}

/// Merges a primary outcome with a release outcome: the primary error
/// always wins, and a release failure surfaces only when nothing else
/// went wrong.
fn settle<R>(
    primary: Result<R>,
    released: Result<()>,
    observer: &dyn QueryObserver,
) -> Result<R> {
    match (primary, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(release_err),
        (Err(primary_err), Ok(())) => Err(primary_err),
        (Err(primary_err), Err(release_err)) => {
            observer.release_failed(&release_err);
            Err(primary_err)
        }
    }
}

/// Reads normalized column metadata from the live cursor, in result-set
/// column order.
fn read_column_metadata(cursor: &dyn Cursor) -> Result<ColumnMetadataSet> {
    let mut metadata = ColumnMetadataSet::new();
    for index in 0..cursor.column_count() {
        let label = cursor.column_label(index)?;
        let vendor_type = cursor.column_type_name(index)?;
        metadata.push(ColumnMetadata::from_driver(label, &vendor_type))?;
    }
    Ok(metadata)
}

/// Default consumer: materializes the whole cursor into a `TableData`.
pub struct TableBuilder {
    observer: Arc<dyn QueryObserver>,
}

impl TableBuilder {
    /// Creates a table builder reporting through the given observer.
    pub fn new(observer: Arc<dyn QueryObserver>) -> Self {
        Self { observer }
    }
}

#[async_trait]
impl ResultConsumer<TableData> for TableBuilder {
    async fn consume(&self, cursor: &mut dyn Cursor) -> Result<TableData> {
        let metadata = read_column_metadata(cursor)?;
        let names: Vec<String> = metadata.iter().map(|c| c.column_name.clone()).collect();

        let started = Instant::now();
        let mut table = TableData::new(metadata);

        while let Some(raw) = cursor.next_row().await? {
            let mut row = RowData::new(Arc::clone(table.columns()));
            for (index, value) in raw.into_iter().enumerate() {
                // Re-read the live vendor type name each row; some drivers
                // report a different type string per row binding.
                let vendor_type = cursor.column_type_name(index)?;
                let name = names.get(index).ok_or_else(|| {
                    DbLinkError::metadata(format!("row cell {index} beyond result shape"))
                })?;
                row.set(name, normalize_value(&vendor_type, value))?;
            }
            table.push(row)?;
        }

        self.observer
            .table_materialized(table.row_count(), started.elapsed());
        Ok(table)
    }
}

/// Headers-only consumer: reads cursor metadata and ignores row data.
pub struct HeaderReader;

#[async_trait]
impl ResultConsumer<ColumnMetadataSet> for HeaderReader {
    async fn consume(&self, cursor: &mut dyn Cursor) -> Result<ColumnMetadataSet> {
        read_column_metadata(cursor)
    }
}

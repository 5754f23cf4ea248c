//! dblink - database-agnostic SQL execution over pooled connections.
//!
//! Runs parameterized SQL against heterogeneous relational engines and
//! materializes results into one driver-independent tabular structure
//! with normalized column metadata.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod observe;
pub mod query;
pub mod table;

pub use config::{Config, DataSourceConfig, ExecutorOptions};
pub use db::{open_pool, ConnectionPool, Cursor, DatabaseBackend, Value};
pub use error::{DbLinkError, Result};
pub use observe::{QueryObserver, TracingObserver};
pub use query::{BoundSql, QueryExecutor, ResultConsumer};
pub use table::{ColumnMetadata, ColumnMetadataSet, RowData, TableData, TargetType};

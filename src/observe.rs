//! Observability sink for query execution.
//!
//! The executor reports structured events through an injectable observer
//! instead of logging ambiently, so embedders can route timing and
//! release diagnostics wherever they need. The default implementation
//! forwards to `tracing`.

use crate::error::DbLinkError;
use std::time::Duration;

/// Receives execution events from the query executor.
///
/// All methods default to no-ops; implementations override the events
/// they care about. These are side-channel events, not part of the
/// functional contract.
pub trait QueryObserver: Send + Sync {
    /// The SQL text, reported before execution.
    fn query_started(&self, _sql: &str) {}

    /// Execution finished; `elapsed` covers the driver round trip.
    fn query_executed(&self, _sql: &str, _elapsed: Duration) {}

    /// A table finished materializing from the cursor.
    fn table_materialized(&self, _rows: usize, _elapsed: Duration) {}

    /// A resource release failed after the primary outcome was decided.
    fn release_failed(&self, _error: &DbLinkError) {}
}

/// Default observer that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn query_started(&self, sql: &str) {
        tracing::info!("Executing query: {sql}");
    }

    fn query_executed(&self, sql: &str, elapsed: Duration) {
        tracing::info!("Query took {}ms: {sql}", elapsed.as_millis());
    }

    fn table_materialized(&self, rows: usize, elapsed: Duration) {
        tracing::info!("Materialized {rows} rows in {}ms", elapsed.as_millis());
    }

    fn release_failed(&self, error: &DbLinkError) {
        tracing::error!("Resource release failed: {error}");
    }
}

//! Mock connection pool for testing.
//!
//! Provides an in-memory pool implementation with scripted results,
//! acquire/release accounting, and injectable failures so the execution
//! pipeline can be exercised without a live database.

use super::{Connection, ConnectionPool, Cursor, Statement, Value};
use crate::config::DataSourceConfig;
use crate::error::{DbLinkError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Which stage of the pipeline the mock should fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Acquisition times out as if the pool were exhausted.
    AcquireTimeout,
    /// Statement execution fails.
    Execute,
    /// Cursor metadata introspection fails.
    Metadata,
    /// Row iteration fails on the first fetch.
    Row,
    /// Returning the connection to the pool fails.
    Release,
}

/// One column of a scripted result.
#[derive(Debug, Clone)]
pub struct MockColumn {
    pub name: String,
    pub type_name: String,
}

impl MockColumn {
    /// Creates a column with the given label and vendor type name.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A scripted result set keyed by SQL text.
#[derive(Debug, Clone, Default)]
pub struct MockResult {
    pub columns: Vec<MockColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl MockResult {
    /// Creates a result with the given columns and rows.
    pub fn new(columns: Vec<MockColumn>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }
}

struct MockState {
    results: Mutex<HashMap<String, MockResult>>,
    fail: Option<FailureMode>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    prepared: AtomicUsize,
}

/// A mock connection pool that serves predefined results.
pub struct MockPool {
    state: Arc<MockState>,
}

impl MockPool {
    /// Creates a new mock pool with no scripted results.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                results: Mutex::new(HashMap::new()),
                fail: None,
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                prepared: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a mock pool that fails at the given pipeline stage.
    pub fn failing(mode: FailureMode) -> Self {
        Self {
            state: Arc::new(MockState {
                results: Mutex::new(HashMap::new()),
                fail: Some(mode),
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                prepared: AtomicUsize::new(0),
            }),
        }
    }

    /// Scripts the result returned for the given SQL text.
    pub fn with_result(self, sql: impl Into<String>, result: MockResult) -> Self {
        self.state
            .results
            .lock()
            .expect("mock results lock poisoned")
            .insert(sql.into(), result);
        self
    }

    /// Number of successful acquisitions so far.
    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    /// Number of release calls so far.
    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// Number of statements prepared so far.
    pub fn prepared(&self) -> usize {
        self.state.prepared.load(Ordering::SeqCst)
    }
}

impl Default for MockPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    async fn acquire(
        &self,
        _source: &DataSourceConfig,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>> {
        if self.state.fail == Some(FailureMode::AcquireTimeout) {
            return Err(DbLinkError::pool_acquisition(format!(
                "No connection available within {}ms",
                timeout.as_millis()
            )));
        }

        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }

    async fn release(&self, conn: Box<dyn Connection>) -> Result<()> {
        drop(conn);
        self.state.released.fetch_add(1, Ordering::SeqCst);

        if self.state.fail == Some(FailureMode::Release) {
            return Err(DbLinkError::release("simulated pool release failure"));
        }
        Ok(())
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Statement + 'a>> {
        self.state.prepared.fetch_add(1, Ordering::SeqCst);

        let result = self
            .state
            .results
            .lock()
            .expect("mock results lock poisoned")
            .get(sql)
            .cloned()
            .unwrap_or_else(|| default_result(sql));

        Ok(Box::new(MockStatement {
            state: Arc::clone(&self.state),
            sql: sql.to_string(),
            result,
        }))
    }
}

/// Fallback result for SQL with no scripted entry, mirroring a one-cell
/// text result so callers always get something table-shaped back.
fn default_result(sql: &str) -> MockResult {
    MockResult::new(
        vec![MockColumn::new("result", "TEXT")],
        vec![vec![Value::String(format!("Mock result for: {sql}"))]],
    )
}

struct MockStatement {
    state: Arc<MockState>,
    sql: String,
    result: MockResult,
}

#[async_trait]
impl Statement for MockStatement {
    async fn execute<'a>(&'a mut self, _params: &'a [Value]) -> Result<Box<dyn Cursor + 'a>> {
        if self.state.fail == Some(FailureMode::Execute) {
            return Err(DbLinkError::execution(
                self.sql.clone(),
                "simulated execution failure",
            ));
        }

        Ok(Box::new(MockCursor {
            sql: self.sql.clone(),
            columns: self.result.columns.clone(),
            rows: self.result.rows.clone().into(),
            fail_metadata: self.state.fail == Some(FailureMode::Metadata),
            fail_row: self.state.fail == Some(FailureMode::Row),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MockCursor {
    sql: String,
    columns: Vec<MockColumn>,
    rows: VecDeque<Vec<Value>>,
    fail_metadata: bool,
    fail_row: bool,
}

#[async_trait]
impl Cursor for MockCursor {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_label(&self, index: usize) -> Result<String> {
        if self.fail_metadata {
            return Err(DbLinkError::metadata("simulated metadata failure"));
        }
        self.columns
            .get(index)
            .map(|col| col.name.clone())
            .ok_or_else(|| DbLinkError::metadata(format!("No column at index {index}")))
    }

    fn column_type_name(&self, index: usize) -> Result<String> {
        if self.fail_metadata {
            return Err(DbLinkError::metadata("simulated metadata failure"));
        }
        self.columns
            .get(index)
            .map(|col| col.type_name.clone())
            .ok_or_else(|| DbLinkError::metadata(format!("No column at index {index}")))
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.fail_row {
            return Err(DbLinkError::execution(
                self.sql.clone(),
                "simulated row iteration failure",
            ));
        }
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

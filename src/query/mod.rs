//! Query types and execution.

mod executor;

pub use executor::{HeaderReader, QueryExecutor, ResultConsumer, TableBuilder};

use crate::db::Value;

/// A SQL statement with its ordered positional parameter values, ready
/// for execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundSql {
    /// The SQL text, executed exactly as supplied.
    pub sql: String,

    /// Positional parameters, bound in list order. Empty means no
    /// binding step runs.
    pub params: Vec<Value>,
}

impl BoundSql {
    /// Creates a bound statement with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a bound statement with the given parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Appends one positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

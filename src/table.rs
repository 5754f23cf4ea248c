//! Tabular result model for dblink.
//!
//! Defines the normalized, driver-independent structures a query
//! materializes into: per-column metadata, an ordered unique-keyed
//! metadata set, named-cell rows, and the table snapshot handed to
//! callers.

use crate::db::Value;
use crate::error::{DbLinkError, Result};
use crate::normalize::normalize_type_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Display/processing classification attached to a column, independent of
/// its normalized data type. `Original` means the driver value passes
/// through untransformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Original,
    Text,
    Number,
    DateTime,
}

/// Normalized description of one result-set column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// The result-set label (driver-reported alias or actual column name).
    pub column_name: String,

    /// Canonical alias. Starts equal to `column_name`; downstream aliasing
    /// may diverge it, so it is stored separately.
    pub field_name: String,

    /// Vendor type name, upper-cased and truncated at the first space
    /// (drops qualifiers like "UNSIGNED" or "ZEROFILL").
    pub data_type: String,

    /// Rendering classification for downstream consumers.
    pub target_type: TargetType,
}

impl ColumnMetadata {
    /// Builds metadata from a driver-reported label and vendor type name.
    pub fn from_driver(label: impl Into<String>, vendor_type: &str) -> Self {
        let column_name = label.into();
        Self {
            field_name: column_name.clone(),
            column_name,
            data_type: normalize_type_name(vendor_type),
            target_type: TargetType::Original,
        }
    }
}

/// Ordered collection of column metadata, unique-keyed by column name.
///
/// Insertion order matches result-set column order, so positional access
/// and named access stay consistent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMetadataSet {
    columns: Vec<ColumnMetadata>,
    index: HashMap<String, usize>,
}

impl ColumnMetadataSet {
    /// Creates an empty metadata set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, rejecting duplicate column names.
    pub fn push(&mut self, column: ColumnMetadata) -> Result<()> {
        if self.index.contains_key(&column.column_name) {
            return Err(DbLinkError::metadata(format!(
                "duplicate column name \"{}\" in result set",
                column.column_name
            )));
        }
        self.index
            .insert(column.column_name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Looks up a column by name.
    pub fn get(&self, name: &str) -> Option<&ColumnMetadata> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Looks up a column by 0-based position.
    pub fn get_at(&self, index: usize) -> Option<&ColumnMetadata> {
        self.columns.get(index)
    }

    /// Returns true if a column with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the set has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates columns in result-set order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter()
    }

    /// Column names in result-set order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }
}

/// One row of normalized cells, keyed by column name and validated
/// against the metadata set it was built for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowData {
    #[serde(skip)]
    columns: Arc<ColumnMetadataSet>,
    cells: HashMap<String, Value>,
}

impl RowData {
    /// Creates an empty row bound to the given metadata set.
    pub fn new(columns: Arc<ColumnMetadataSet>) -> Self {
        Self {
            columns,
            cells: HashMap::new(),
        }
    }

    /// Sets a cell value, rejecting names outside the metadata set.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        if !self.columns.contains(name) {
            return Err(DbLinkError::internal(format!(
                "cell \"{name}\" is not a column of this row's metadata set"
            )));
        }
        self.cells.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns the cell value for a column, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.get(name)
    }

    /// Returns values in the metadata set's column order; unset cells
    /// read as null.
    pub fn values(&self) -> Vec<&Value> {
        static NULL: Value = Value::Null;
        self.columns
            .iter()
            .map(|c| self.cells.get(&c.column_name).unwrap_or(&NULL))
            .collect()
    }

    fn shares_columns(&self, columns: &Arc<ColumnMetadataSet>) -> bool {
        Arc::ptr_eq(&self.columns, columns)
    }
}

/// Fully materialized, caller-owned snapshot of a query's results.
///
/// Created per invocation and populated before being returned; callers
/// get a read-only view and sole ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableData {
    columns: Arc<ColumnMetadataSet>,
    rows: Vec<RowData>,
}

impl TableData {
    /// Creates an empty table owning the given metadata set.
    pub fn new(columns: ColumnMetadataSet) -> Self {
        Self {
            columns: Arc::new(columns),
            rows: Vec::new(),
        }
    }

    /// The shared metadata set new rows must be bound to.
    pub fn columns(&self) -> &Arc<ColumnMetadataSet> {
        &self.columns
    }

    /// Appends a row, rejecting rows bound to a different metadata set.
    pub fn push(&mut self, row: RowData) -> Result<()> {
        if !row.shares_columns(&self.columns) {
            return Err(DbLinkError::internal(
                "row is bound to a different column metadata set",
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Rows in result-set iteration order.
    pub fn rows(&self) -> &[RowData] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exports rows as JSON objects keyed by column name, in column order.
    pub fn to_json_rows(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for column in self.columns.iter() {
                    let value = row
                        .get(&column.column_name)
                        .map(Value::to_json)
                        .unwrap_or(serde_json::Value::Null);
                    object.insert(column.column_name.clone(), value);
                }
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

//! Column metadata and value normalization tests.
//!
//! Covers the metadata extraction path and the type-name-driven cell
//! conversions through the public API.

use dblink::db::{MockColumn, MockPool, MockResult};
use dblink::{
    BoundSql, ConnectionPool, DataSourceConfig, QueryExecutor, TargetType, Value,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn executor_for(pool: &Arc<MockPool>) -> QueryExecutor {
    QueryExecutor::new(
        Arc::clone(pool) as Arc<dyn ConnectionPool>,
        DataSourceConfig::default(),
    )
}

#[tokio::test]
async fn test_headers_only_executes_statement() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT id, email FROM users",
        MockResult::new(
            vec![
                MockColumn::new("id", "INT4"),
                MockColumn::new("email", "VARCHAR"),
            ],
            vec![vec![Value::Int(1), Value::String("a@example.com".into())]],
        ),
    ));
    let executor = executor_for(&pool);

    let metadata = executor
        .column_metadata(&BoundSql::new("SELECT id, email FROM users"))
        .await
        .unwrap();

    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata.names(), vec!["id", "email"]);
    // The statement runs in full even though rows are ignored.
    assert_eq!(pool.prepared(), 1);
    assert_eq!(pool.acquired(), 1);
    assert_eq!(pool.released(), 1);
}

#[tokio::test]
async fn test_metadata_count_matches_cursor_columns() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT a, b, c FROM t",
        MockResult::new(
            vec![
                MockColumn::new("a", "INT4"),
                MockColumn::new("b", "TEXT"),
                MockColumn::new("c", "BOOL"),
            ],
            vec![],
        ),
    ));
    let executor = executor_for(&pool);

    let metadata = executor
        .column_metadata(&BoundSql::new("SELECT a, b, c FROM t"))
        .await
        .unwrap();

    assert_eq!(metadata.len(), 3);
    assert_eq!(metadata.names(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_qualified_type_names_truncate() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT n, m FROM t",
        MockResult::new(
            vec![
                MockColumn::new("n", "INT UNSIGNED"),
                MockColumn::new("m", "INT(10)"),
            ],
            vec![],
        ),
    ));
    let executor = executor_for(&pool);

    let metadata = executor
        .column_metadata(&BoundSql::new("SELECT n, m FROM t"))
        .await
        .unwrap();

    // Space-qualified names truncate; parenthesized names do not.
    assert_eq!(metadata.get("n").unwrap().data_type, "INT");
    assert_eq!(metadata.get("m").unwrap().data_type, "INT(10)");
}

#[tokio::test]
async fn test_metadata_defaults() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT id FROM t",
        MockResult::new(vec![MockColumn::new("id", "int8")], vec![]),
    ));
    let executor = executor_for(&pool);

    let metadata = executor
        .column_metadata(&BoundSql::new("SELECT id FROM t"))
        .await
        .unwrap();

    let column = metadata.get("id").unwrap();
    assert_eq!(column.field_name, column.column_name);
    assert_eq!(column.data_type, "INT8");
    assert_eq!(column.target_type, TargetType::Original);
}

#[tokio::test]
async fn test_geometry_values_render_as_text() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT shape FROM zones",
        MockResult::new(
            vec![MockColumn::new("shape", "GEOMETRY")],
            vec![
                vec![Value::String("POLYGON((0 0,1 0,1 1,0 0))".into())],
                vec![Value::Null],
            ],
        ),
    ));
    let executor = executor_for(&pool);

    let table = executor
        .query_table(&BoundSql::new("SELECT shape FROM zones"))
        .await
        .unwrap();

    assert_eq!(
        table.rows()[0].get("shape"),
        Some(&Value::String("POLYGON((0 0,1 0,1 1,0 0))".into()))
    );
    assert_eq!(table.rows()[1].get("shape"), Some(&Value::Null));
}

#[tokio::test]
async fn test_binary_values_decode_per_row() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT data FROM blobs",
        MockResult::new(
            vec![MockColumn::new("data", "LongBlob")],
            vec![
                vec![Value::Bytes(b"first".to_vec())],
                vec![Value::Bytes(b"second".to_vec())],
                vec![Value::Null],
            ],
        ),
    ));
    let executor = executor_for(&pool);

    let table = executor
        .query_table(&BoundSql::new("SELECT data FROM blobs"))
        .await
        .unwrap();

    assert_eq!(
        table.rows()[0].get("data"),
        Some(&Value::String("first".into()))
    );
    assert_eq!(
        table.rows()[1].get("data"),
        Some(&Value::String("second".into()))
    );
    assert_eq!(table.rows()[2].get("data"), Some(&Value::Null));
}

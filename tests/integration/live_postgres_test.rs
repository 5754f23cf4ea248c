//! Live PostgreSQL execution tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use dblink::{
    open_pool, BoundSql, DataSourceConfig, DbLinkError, ExecutorOptions, QueryExecutor, Value,
};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create an executor against the test database.
fn get_test_executor() -> Option<QueryExecutor> {
    let url = get_test_database_url()?;
    let source = DataSourceConfig::from_connection_string(&url).ok()?;
    let options = ExecutorOptions::default();
    let pool = open_pool(&source, &options);
    Some(QueryExecutor::new(pool, source).with_options(options))
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let table = executor
        .query_table(&BoundSql::new("SELECT 1 as num, 'hello' as greeting"))
        .await
        .unwrap();

    assert_eq!(table.columns().len(), 2);
    assert_eq!(table.columns().names(), vec!["num", "greeting"]);
    assert_eq!(table.row_count(), 1);
    assert_eq!(
        table.rows()[0].get("greeting"),
        Some(&Value::String("hello".to_string()))
    );
}

#[tokio::test]
async fn test_execute_with_positional_params() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let bound = BoundSql::new("SELECT $1::int8 + $2::int8 as total")
        .bind(40i64)
        .bind(2i64);
    let table = executor.query_table(&bound).await.unwrap();

    assert_eq!(table.row_count(), 1);
    assert_eq!(table.rows()[0].get("total"), Some(&Value::Int(42)));
}

#[tokio::test]
async fn test_execute_select_with_null() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let table = executor
        .query_table(&BoundSql::new("SELECT NULL::text as missing"))
        .await
        .unwrap();

    assert_eq!(table.rows()[0].get("missing"), Some(&Value::Null));
}

#[tokio::test]
async fn test_headers_for_empty_result() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let metadata = executor
        .column_metadata(&BoundSql::new(
            "SELECT 1 as id, 'x' as label WHERE 1 = 0",
        ))
        .await
        .unwrap();

    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata.names(), vec!["id", "label"]);
}

#[tokio::test]
async fn test_execute_query_with_syntax_error() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor.query_table(&BoundSql::new("SELEC 1")).await;

    match result {
        Err(DbLinkError::Execution { sql, message }) => {
            assert_eq!(sql, "SELEC 1");
            assert!(
                message.to_lowercase().contains("syntax")
                    || message.to_lowercase().contains("error"),
                "Expected syntax error, got: {message}"
            );
        }
        other => panic!("Expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_query_with_nonexistent_table() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .query_table(&BoundSql::new("SELECT * FROM nonexistent_table_xyz_123"))
        .await;

    assert!(result.is_err());
    let error = result.unwrap_err();
    let error_msg = error.to_string().to_lowercase();
    assert!(
        error_msg.contains("does not exist") || error_msg.contains("not exist"),
        "Expected 'does not exist' error, got: {error_msg}"
    );
}

#[tokio::test]
async fn test_bytea_round_trip() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // Postgres reports BYTEA, which is not a BINARY/BLOB spelling, so the
    // raw bytes come back unconverted.
    let table = executor
        .query_table(&BoundSql::new("SELECT '\\x6869'::bytea as data"))
        .await
        .unwrap();

    assert_eq!(
        table.rows()[0].get("data"),
        Some(&Value::Bytes(b"hi".to_vec()))
    );
}

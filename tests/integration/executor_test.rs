//! End-to-end execution tests against the mock pool.
//!
//! Exercises the full acquire → execute → materialize → release pipeline
//! through the public API.

use dblink::db::{FailureMode, MockColumn, MockPool, MockResult};
use dblink::{
    BoundSql, ConnectionPool, DataSourceConfig, DbLinkError, QueryExecutor, Value,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn executor_for(pool: &Arc<MockPool>) -> QueryExecutor {
    QueryExecutor::new(
        Arc::clone(pool) as Arc<dyn ConnectionPool>,
        DataSourceConfig::default(),
    )
}

fn users_result() -> MockResult {
    MockResult::new(
        vec![
            MockColumn::new("id", "INT4"),
            MockColumn::new("name", "VARCHAR"),
        ],
        vec![
            vec![Value::Int(1), Value::String("Alice".into())],
            vec![Value::Int(2), Value::String("Bob".into())],
        ],
    )
}

#[tokio::test]
async fn test_two_column_two_row_select() {
    let pool =
        Arc::new(MockPool::new().with_result("SELECT id, name FROM users", users_result()));
    let executor = executor_for(&pool);

    let table = executor
        .query_table(&BoundSql::new("SELECT id, name FROM users"))
        .await
        .unwrap();

    assert_eq!(table.columns().len(), 2);
    assert_eq!(table.columns().names(), vec!["id", "name"]);
    assert_eq!(table.row_count(), 2);

    // Values pass through unchanged for ordinary types.
    assert_eq!(table.rows()[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(
        table.rows()[0].get("name"),
        Some(&Value::String("Alice".into()))
    );
    assert_eq!(table.rows()[1].get("id"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_empty_result_still_has_columns() {
    let pool = Arc::new(MockPool::new().with_result(
        "SELECT id FROM users WHERE 1 = 0",
        MockResult::new(vec![MockColumn::new("id", "INT4")], vec![]),
    ));
    let executor = executor_for(&pool);

    let table = executor
        .query_table(&BoundSql::new("SELECT id FROM users WHERE 1 = 0"))
        .await
        .unwrap();

    assert!(table.is_empty());
    assert_eq!(table.columns().len(), 1);
    assert_eq!(table.columns().get("id").unwrap().data_type, "INT4");
}

#[tokio::test]
async fn test_json_export_round_trip() {
    let pool =
        Arc::new(MockPool::new().with_result("SELECT id, name FROM users", users_result()));
    let executor = executor_for(&pool);

    let table = executor
        .query_table(&BoundSql::new("SELECT id, name FROM users"))
        .await
        .unwrap();

    assert_eq!(
        table.to_json_rows(),
        serde_json::json!([
            {"id": 1, "name": "Alice"},
            {"id": 2, "name": "Bob"},
        ])
    );
}

#[tokio::test]
async fn test_pool_exhaustion_returns_no_partial_table() {
    let pool = Arc::new(MockPool::failing(FailureMode::AcquireTimeout));
    let executor = executor_for(&pool);

    let result = executor
        .query_table(&BoundSql::new("SELECT id FROM users"))
        .await;

    assert!(matches!(result, Err(DbLinkError::PoolAcquisition(_))));
    // No statement was ever prepared.
    assert_eq!(pool.prepared(), 0);
}

#[tokio::test]
async fn test_release_happens_once_per_invocation() {
    let pool =
        Arc::new(MockPool::new().with_result("SELECT id, name FROM users", users_result()));
    let executor = executor_for(&pool);

    for _ in 0..3 {
        executor
            .query_table(&BoundSql::new("SELECT id, name FROM users"))
            .await
            .unwrap();
    }

    assert_eq!(pool.acquired(), 3);
    assert_eq!(pool.released(), 3);
}

#[tokio::test]
async fn test_release_happens_once_when_rows_fail() {
    let pool = Arc::new(MockPool::failing(FailureMode::Row));
    let executor = executor_for(&pool);

    let result = executor.query_table(&BoundSql::new("SELECT 1")).await;

    assert!(result.is_err());
    assert_eq!(pool.acquired(), 1);
    assert_eq!(pool.released(), 1);
}

#[tokio::test]
async fn test_concurrent_invocations_do_not_interfere() {
    let pool = Arc::new(
        MockPool::new()
            .with_result(
                "SELECT id FROM users",
                MockResult::new(
                    vec![MockColumn::new("id", "INT4")],
                    vec![vec![Value::Int(1)], vec![Value::Int(2)]],
                ),
            )
            .with_result(
                "SELECT total FROM orders",
                MockResult::new(
                    vec![MockColumn::new("total", "FLOAT8")],
                    vec![vec![Value::Float(9.5)]],
                ),
            ),
    );

    let users_executor = executor_for(&pool);
    let orders_executor = executor_for(&pool);

    let users_task = tokio::spawn(async move {
        users_executor
            .query_table(&BoundSql::new("SELECT id FROM users"))
            .await
    });
    let orders_task = tokio::spawn(async move {
        orders_executor
            .query_table(&BoundSql::new("SELECT total FROM orders"))
            .await
    });

    let users = users_task.await.unwrap().unwrap();
    let orders = orders_task.await.unwrap().unwrap();

    // Each result reflects only its own query.
    assert_eq!(users.columns().names(), vec!["id"]);
    assert_eq!(users.row_count(), 2);
    assert_eq!(orders.columns().names(), vec!["total"]);
    assert_eq!(orders.rows()[0].get("total"), Some(&Value::Float(9.5)));

    assert_eq!(pool.acquired(), 2);
    assert_eq!(pool.released(), 2);
}

#[tokio::test]
async fn test_table_is_exclusively_owned_by_caller() {
    let pool =
        Arc::new(MockPool::new().with_result("SELECT id, name FROM users", users_result()));
    let executor = executor_for(&pool);

    let first = executor
        .query_table(&BoundSql::new("SELECT id, name FROM users"))
        .await
        .unwrap();
    let second = executor
        .query_table(&BoundSql::new("SELECT id, name FROM users"))
        .await
        .unwrap();

    // Separate invocations never share metadata or row storage.
    assert!(!Arc::ptr_eq(first.columns(), second.columns()));
}

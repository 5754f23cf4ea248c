//! Integration tests for dblink.
//!
//! Live-database tests require a running PostgreSQL instance.
//! Set DATABASE_URL environment variable to run them.

pub mod executor_test;
pub mod live_postgres_test;
pub mod metadata_test;

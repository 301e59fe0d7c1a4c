//! PostgreSQL persistence module.
//!
//! Provides the connection pool used by the PostgreSQL template repository.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};

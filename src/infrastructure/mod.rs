//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Application error type and HTTP mapping
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;

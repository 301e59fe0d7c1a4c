//! Backend trait for template descriptor storage.
//!
//! Descriptors are read directly through [`TemplateRepository`]; every
//! mutation goes through a [`TemplateUnitOfWork`] so that the uniqueness
//! checks, the insert or delete, and the caller's payload work either all
//! take effect on commit or none do.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::RepositoryConfig;
use crate::postgres::PostgresPool;

use super::types::{TemplateDescriptor, TemplateError};

pub use memory::MemoryTemplateRepository;
pub use postgres::PostgresTemplateRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A descriptor with this code already exists (storage-level constraint)
    #[error("Template code conflict: {0}")]
    CodeConflict(String),

    /// A descriptor with this name already exists (storage-level constraint)
    #[error("Template name conflict: {0}")]
    NameConflict(String),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
}

impl From<RepositoryError> for TemplateError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::CodeConflict(code) => TemplateError::CodeAlreadyExists(code),
            RepositoryError::NameConflict(name) => TemplateError::NameAlreadyExists(name),
            other => TemplateError::Internal(other.to_string()),
        }
    }
}

/// Durable store of template descriptors, unique by code and by name
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    async fn exists_by_code(&self, code: &str) -> Result<bool, RepositoryError>;

    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError>;

    async fn find_by_code(&self, code: &str)
        -> Result<Option<TemplateDescriptor>, RepositoryError>;

    /// A page of descriptors ordered by name ascending
    async fn find_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TemplateDescriptor>, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;

    /// Start a unit of work for a mutating operation
    async fn begin(&self) -> Result<Box<dyn TemplateUnitOfWork>, RepositoryError>;
}

/// A single atomic mutation scope. Dropping it without `commit` discards
/// every staged change.
#[async_trait]
pub trait TemplateUnitOfWork: Send {
    async fn exists_by_code(&mut self, code: &str) -> Result<bool, RepositoryError>;

    async fn exists_by_name(&mut self, name: &str) -> Result<bool, RepositoryError>;

    /// Insert a descriptor; uniqueness of code and name is enforced here
    async fn insert(&mut self, descriptor: &TemplateDescriptor) -> Result<(), RepositoryError>;

    /// Delete by code; returns whether a descriptor was removed
    async fn delete(&mut self, code: &str) -> Result<bool, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Create a template repository based on configuration.
///
/// - `"postgres"`: Returns a `PostgresTemplateRepository` if a pool is provided
/// - `"memory"` (default): Returns a `MemoryTemplateRepository`
pub fn create_template_repository(
    settings: &RepositoryConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn TemplateRepository> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL template repository");
                Arc::new(PostgresTemplateRepository::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL repository requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryTemplateRepository::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory template repository");
            Arc::new(MemoryTemplateRepository::new())
        }
    }
}

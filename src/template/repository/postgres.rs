//! PostgreSQL-based template repository.
//!
//! Descriptors live in the `templates` table with the parameter set stored
//! as JSONB. Unique constraints on `code` and `name` are enforced by the
//! database, so two racing imports resolve to one insert and one conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::template::types::{ParameterSet, TemplateDescriptor};

use super::{RepositoryError, TemplateRepository, TemplateUnitOfWork};

/// Schema applied by [`PostgresTemplateRepository::ensure_schema`]
const SCHEMA: &str = include_str!("../../../migrations/0001_create_templates.sql");

const CODE_CONSTRAINT: &str = "templates_code_key";
const NAME_CONSTRAINT: &str = "templates_name_key";

type TemplateRow = (
    Uuid,
    String,
    String,
    Option<String>,
    Json<ParameterSet>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn from_row(row: TemplateRow) -> TemplateDescriptor {
    let (id, code, name, description, parameters, created_at, updated_at) = row;
    TemplateDescriptor {
        id,
        name,
        code,
        description,
        parameters: parameters.0,
        created_at,
        updated_at,
    }
}

/// Translate storage-level unique violations into typed conflicts
fn map_insert_error(err: sqlx::Error, descriptor: &TemplateDescriptor) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(CODE_CONSTRAINT) => {
                    return RepositoryError::CodeConflict(descriptor.code.clone())
                }
                Some(NAME_CONSTRAINT) => {
                    return RepositoryError::NameConflict(descriptor.name.clone())
                }
                _ => {}
            }
        }
    }
    RepositoryError::Postgres(err)
}

/// PostgreSQL template repository
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `templates` table and its unique constraints if missing
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Template schema ensured");
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn exists_by_code(&self, code: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<TemplateDescriptor>, RepositoryError> {
        let row: Option<TemplateRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, description, parameters, created_at, updated_at
            FROM templates
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    async fn find_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TemplateDescriptor>, RepositoryError> {
        let rows: Vec<TemplateRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, description, parameters, created_at, updated_at
            FROM templates
            ORDER BY name ASC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(offset.min(i64::MAX as u64) as i64)
        .bind(limit.min(i64::MAX as u64) as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM templates")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn begin(&self) -> Result<Box<dyn TemplateUnitOfWork>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }
}

struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TemplateUnitOfWork for PostgresUnitOfWork {
    async fn exists_by_code(&mut self, code: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE code = $1)")
                .bind(code)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn exists_by_name(&mut self, name: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE name = $1)")
                .bind(name)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert(&mut self, descriptor: &TemplateDescriptor) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, code, name, description, parameters, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(descriptor.id)
        .bind(&descriptor.code)
        .bind(&descriptor.name)
        .bind(&descriptor.description)
        .bind(Json(&descriptor.parameters))
        .bind(descriptor.created_at)
        .bind(descriptor.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, descriptor))?;

        tracing::trace!(code = %descriptor.code, "Template row inserted");
        Ok(())
    }

    async fn delete(&mut self, code: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM templates WHERE code = $1")
            .bind(code)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ParameterSpec;

    #[test]
    fn test_schema_declares_unique_constraints() {
        assert!(SCHEMA.contains(CODE_CONSTRAINT));
        assert!(SCHEMA.contains(NAME_CONSTRAINT));
        assert!(SCHEMA.contains("JSONB"));
    }

    #[test]
    fn test_row_mapping() {
        let now = Utc::now();
        let parameters: ParameterSet = vec![ParameterSpec::optional("footer")].into();
        let row: TemplateRow = (
            Uuid::nil(),
            "welcome".to_string(),
            "Welcome".to_string(),
            None,
            Json(parameters),
            now,
            now,
        );

        let descriptor = from_row(row);
        assert_eq!(descriptor.code, "welcome");
        assert_eq!(descriptor.name, "Welcome");
        assert!(!descriptor.parameters.iter().next().unwrap().required);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let descriptor = TemplateDescriptor::new("Welcome", "welcome", None, ParameterSet::new());
        let err = map_insert_error(sqlx::Error::RowNotFound, &descriptor);
        assert!(matches!(err, RepositoryError::Postgres(sqlx::Error::RowNotFound)));
    }
}

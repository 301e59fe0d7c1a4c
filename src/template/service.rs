//! Import, render and management operations over templates

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::TemplateMetrics;

use super::archive::{self, ExtractedArchive};
use super::config_validation;
use super::contract;
use super::repository::{TemplateRepository, TemplateUnitOfWork};
use super::storage::{MarkupStore, StagedMarkup};
use super::engine::RenderEngine;
use super::types::{
    PageQuery, RenderRequest, TemplateDescriptor, TemplateError, TemplateOutput, TemplateResult,
};

/// Composes archive extraction, configuration validation, the descriptor
/// repository, the markup store and the render engine.
pub struct TemplateService {
    repository: Arc<dyn TemplateRepository>,
    store: Arc<MarkupStore>,
    engine: Arc<dyn RenderEngine>,
}

impl TemplateService {
    pub fn new(
        repository: Arc<dyn TemplateRepository>,
        store: Arc<MarkupStore>,
        engine: Arc<dyn RenderEngine>,
    ) -> Self {
        Self {
            repository,
            store,
            engine,
        }
    }

    pub fn repository(&self) -> &Arc<dyn TemplateRepository> {
        &self.repository
    }

    pub fn store(&self) -> &Arc<MarkupStore> {
        &self.store
    }

    /// Import a template archive.
    ///
    /// Validation failures are returned before anything is written. The
    /// uniqueness checks, the payload write and the descriptor insert run
    /// in one unit of work and are rolled back together on failure.
    #[tracing::instrument(name = "template.import", skip_all, fields(archive_bytes = archive_bytes.len()))]
    pub async fn import_template(&self, archive_bytes: Vec<u8>) -> TemplateResult<TemplateDescriptor> {
        let result = self.import(archive_bytes).await;
        match &result {
            Ok(descriptor) => {
                TemplateMetrics::record_imported();
                tracing::info!(code = %descriptor.code, name = %descriptor.name, "Template imported");
            }
            Err(e) => {
                TemplateMetrics::record_import_failed(e.reason());
                log_failure("import", e);
            }
        }
        result
    }

    async fn import(&self, archive_bytes: Vec<u8>) -> TemplateResult<TemplateDescriptor> {
        let extracted = tokio::task::spawn_blocking(move || archive::extract_all(&archive_bytes))
            .await
            .map_err(|e| TemplateError::Internal(format!("extraction task failed: {}", e)))??;

        let config = extracted.read_config()?;
        let descriptor = config_validation::parse_and_validate(&config)?;

        let markup = String::from_utf8(extracted.read_markup()?)
            .map_err(|_| TemplateError::InvalidMarkup("markup is not valid UTF-8".to_string()))?;
        self.engine.compile(&markup)?;

        let mut uow = self.repository.begin().await?;
        let staged = self
            .stage_and_insert(uow.as_mut(), &descriptor, &extracted)
            .await;
        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                rollback(uow).await;
                return Err(e);
            }
        };

        if let Err(e) = self.store.publish(staged, &descriptor.code) {
            rollback(uow).await;
            return Err(e);
        }

        if let Err(e) = uow.commit().await {
            if let Err(remove_err) = self.store.remove(&descriptor.code).await {
                tracing::error!(
                    code = %descriptor.code,
                    error = %remove_err,
                    "Failed to remove published payload after commit failure"
                );
            }
            return Err(e.into());
        }

        Ok(descriptor)
    }

    async fn stage_and_insert(
        &self,
        uow: &mut dyn TemplateUnitOfWork,
        descriptor: &TemplateDescriptor,
        extracted: &ExtractedArchive,
    ) -> TemplateResult<StagedMarkup> {
        if uow.exists_by_code(&descriptor.code).await? {
            return Err(TemplateError::CodeAlreadyExists(descriptor.code.clone()));
        }
        if uow.exists_by_name(&descriptor.name).await? {
            return Err(TemplateError::NameAlreadyExists(descriptor.name.clone()));
        }

        let staged = self.store.stage(extracted.markup_path()).await?;
        uow.insert(descriptor).await?;
        Ok(staged)
    }

    /// Render a stored template with the supplied parameters
    #[tracing::instrument(name = "template.render", skip_all, fields(code = %request.code))]
    pub async fn render_template(&self, request: &RenderRequest) -> TemplateResult<String> {
        let started = Instant::now();
        let result = self.render(request).await;
        match &result {
            Ok(_) => TemplateMetrics::record_rendered(started.elapsed()),
            Err(e) => {
                TemplateMetrics::record_render_failed(e.reason());
                log_failure("render", e);
            }
        }
        result
    }

    async fn render(&self, request: &RenderRequest) -> TemplateResult<String> {
        let descriptor = self
            .repository
            .find_by_code(&request.code)
            .await?
            .ok_or_else(|| TemplateError::NotFound(request.code.clone()))?;

        let bindings = contract::check(&descriptor.parameters, &request.parameters)?;

        let Some(markup) = self.store.read(&descriptor.code).await? else {
            // Delete removes the descriptor first; if it is gone too, so is the template.
            if self.repository.exists_by_code(&descriptor.code).await? {
                return Err(TemplateError::FileNotFound(descriptor.code));
            }
            return Err(TemplateError::NotFound(descriptor.code));
        };

        self.engine
            .render(&markup, &descriptor.parameters, &bindings)
    }

    /// Delete a template's descriptor, then its markup payload.
    ///
    /// The descriptor delete commits first, so a concurrent render either
    /// still finds the payload or sees the template as not found. A payload
    /// left behind by a failed removal has no descriptor and is replaced by
    /// the next import of the same code.
    #[tracing::instrument(name = "template.delete", skip(self))]
    pub async fn delete_template(&self, code: &str) -> TemplateResult<()> {
        let mut uow = self.repository.begin().await?;

        match uow.delete(code).await {
            Ok(true) => {}
            Ok(false) => {
                rollback(uow).await;
                return Err(TemplateError::NotFound(code.to_string()));
            }
            Err(e) => {
                rollback(uow).await;
                return Err(e.into());
            }
        }

        uow.commit().await?;
        TemplateMetrics::record_deleted();

        match self.store.remove(code).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(code = %code, "Deleted template had no stored payload"),
            Err(e) => {
                tracing::error!(code = %code, error = %e, "Failed to remove payload of deleted template");
            }
        }

        tracing::info!(code = %code, "Template deleted");
        Ok(())
    }

    /// Get a single template by code
    #[tracing::instrument(name = "template.get", skip(self))]
    pub async fn get_template(&self, code: &str) -> TemplateResult<TemplateOutput> {
        self.repository
            .find_by_code(code)
            .await?
            .map(TemplateOutput::from)
            .ok_or_else(|| TemplateError::NotFound(code.to_string()))
    }

    /// List a page of templates ordered by name
    #[tracing::instrument(name = "template.list", skip(self))]
    pub async fn get_templates(&self, query: PageQuery) -> TemplateResult<Vec<TemplateOutput>> {
        let (offset, limit) = query.offset_limit();
        let page = self.repository.find_page(offset, limit).await?;
        Ok(page.into_iter().map(TemplateOutput::from).collect())
    }
}

async fn rollback(uow: Box<dyn TemplateUnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        tracing::error!(error = %e, "Failed to roll back template unit of work");
    }
}

fn log_failure(operation: &str, err: &TemplateError) {
    match err {
        TemplateError::Internal(msg) => {
            tracing::error!(operation = operation, error = %msg, "Template operation failed");
        }
        other => {
            tracing::debug!(operation = operation, reason = other.reason(), "Template operation rejected");
        }
    }
}

//! HTML template system.
//!
//! This module provides:
//! - Archive extraction and shape validation for uploaded templates
//! - Markup checks at import (UTF-8, Tera syntax)
//! - Configuration parsing with field-level constraint reporting
//! - Descriptor storage behind a unit-of-work repository (memory or PostgreSQL)
//! - A file store for markup payloads keyed by template code
//! - Parameter contract enforcement and Tera-based markup rendering
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MarkupStore::init("./storage")?);
//! let service = TemplateService::new(
//!     Arc::new(MemoryTemplateRepository::new()),
//!     store,
//!     Arc::new(TeraRenderEngine::new()),
//! );
//!
//! // Archive holds index.html + config.json
//! service.import_template(archive_bytes).await?;
//!
//! let html = service
//!     .render_template(&RenderRequest {
//!         code: "order_shipped".to_string(),
//!         parameters: vec![ParameterValue::new("order_id", "ORD-123")],
//!     })
//!     .await?;
//! ```

pub mod archive;
pub mod config_validation;
pub mod contract;
mod engine;
pub mod repository;
mod service;
mod storage;
mod types;

pub use engine::{RenderEngine, TeraRenderEngine};
pub use repository::{
    create_template_repository, MemoryTemplateRepository, PostgresTemplateRepository,
    RepositoryError, TemplateRepository, TemplateUnitOfWork,
};
pub use service::TemplateService;
pub use storage::{MarkupStore, StagedMarkup};
pub use types::{
    ArchiveFormatError, Bindings, FieldErrors, InvalidArgumentsReason, PageQuery, ParameterSet,
    ParameterSpec, ParameterValue, RenderRequest, TemplateDescriptor, TemplateError,
    TemplateOutput, TemplateResult,
};

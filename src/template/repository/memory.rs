//! In-memory template repository.
//!
//! Writers are serialized by a single async lock held for the lifetime of
//! a unit of work; readers never take it and only ever observe committed
//! state.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::template::types::TemplateDescriptor;

use super::{RepositoryError, TemplateRepository, TemplateUnitOfWork};

#[derive(Default)]
struct Tables {
    /// Descriptors keyed by code
    by_code: DashMap<String, TemplateDescriptor>,
    /// Unique name index: name -> code
    by_name: DashMap<String, String>,
}

/// In-memory template storage
#[derive(Clone)]
pub struct MemoryTemplateRepository {
    tables: Arc<Tables>,
    write_lock: Arc<Mutex<()>>,
}

impl Default for MemoryTemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn exists_by_code(&self, code: &str) -> Result<bool, RepositoryError> {
        Ok(self.tables.by_code.contains_key(code))
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.tables.by_name.contains_key(name))
    }

    async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<TemplateDescriptor>, RepositoryError> {
        Ok(self.tables.by_code.get(code).map(|t| t.value().clone()))
    }

    async fn find_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TemplateDescriptor>, RepositoryError> {
        let mut all: Vec<TemplateDescriptor> = self
            .tables
            .by_code
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.by_code.len() as u64)
    }

    async fn begin(&self) -> Result<Box<dyn TemplateUnitOfWork>, RepositoryError> {
        let guard = self.write_lock.clone().lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            tables: self.tables.clone(),
            pending: Vec::new(),
            _guard: guard,
        }))
    }
}

enum PendingOp {
    Insert(TemplateDescriptor),
    Delete(String),
}

struct MemoryUnitOfWork {
    tables: Arc<Tables>,
    pending: Vec<PendingOp>,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryUnitOfWork {
    /// Code lookup as seen from inside this unit (committed state + staged ops)
    fn visible_by_code(&self, code: &str) -> Option<TemplateDescriptor> {
        let mut current = self.tables.by_code.get(code).map(|t| t.value().clone());
        for op in &self.pending {
            match op {
                PendingOp::Insert(t) if t.code == code => current = Some(t.clone()),
                PendingOp::Delete(c) if c == code => current = None,
                _ => {}
            }
        }
        current
    }

    fn visible_name(&self, name: &str) -> bool {
        let mut owner = self.tables.by_name.get(name).map(|c| c.value().clone());
        for op in &self.pending {
            match op {
                PendingOp::Insert(t) if t.name == name => owner = Some(t.code.clone()),
                PendingOp::Delete(c) if owner.as_deref() == Some(c.as_str()) => owner = None,
                _ => {}
            }
        }
        owner.is_some()
    }
}

#[async_trait]
impl TemplateUnitOfWork for MemoryUnitOfWork {
    async fn exists_by_code(&mut self, code: &str) -> Result<bool, RepositoryError> {
        Ok(self.visible_by_code(code).is_some())
    }

    async fn exists_by_name(&mut self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.visible_name(name))
    }

    async fn insert(&mut self, descriptor: &TemplateDescriptor) -> Result<(), RepositoryError> {
        if self.visible_by_code(&descriptor.code).is_some() {
            return Err(RepositoryError::CodeConflict(descriptor.code.clone()));
        }
        if self.visible_name(&descriptor.name) {
            return Err(RepositoryError::NameConflict(descriptor.name.clone()));
        }
        self.pending.push(PendingOp::Insert(descriptor.clone()));
        Ok(())
    }

    async fn delete(&mut self, code: &str) -> Result<bool, RepositoryError> {
        if self.visible_by_code(code).is_none() {
            return Ok(false);
        }
        self.pending.push(PendingOp::Delete(code.to_string()));
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let this = *self;
        for op in this.pending {
            match op {
                PendingOp::Insert(descriptor) => {
                    this.tables
                        .by_name
                        .insert(descriptor.name.clone(), descriptor.code.clone());
                    this.tables
                        .by_code
                        .insert(descriptor.code.clone(), descriptor);
                }
                PendingOp::Delete(code) => {
                    if let Some((_, descriptor)) = this.tables.by_code.remove(&code) {
                        this.tables.by_name.remove(&descriptor.name);
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

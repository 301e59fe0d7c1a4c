//! File-system store for markup payloads, addressed by template code

use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::types::{TemplateError, TemplateResult};

const PAYLOAD_EXTENSION: &str = "html";

/// Markup payloads stored as `<root>/<code>.html`
#[derive(Debug, Clone)]
pub struct MarkupStore {
    root: PathBuf,
}

/// A payload written into the store directory but not yet visible under
/// its code. Dropping it without publishing removes the file.
#[derive(Debug)]
pub struct StagedMarkup {
    file: NamedTempFile,
}

impl MarkupStore {
    /// Create the storage root if needed. Called once at startup.
    pub fn init(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::info!(path = %root.display(), "Markup storage initialized");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the payload for `code`, or `None` for codes that cannot name a payload
    pub fn path_for(&self, code: &str) -> Option<PathBuf> {
        let valid = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        valid.then(|| self.root.join(format!("{}.{}", code, PAYLOAD_EXTENSION)))
    }

    /// Copy a payload into the store directory without publishing it
    pub async fn stage(&self, source: &Path) -> TemplateResult<StagedMarkup> {
        let root = self.root.clone();
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || -> io::Result<StagedMarkup> {
            let mut file = NamedTempFile::new_in(&root)?;
            let mut reader = std::fs::File::open(&source)?;
            io::copy(&mut reader, &mut file)?;
            file.as_file().sync_all()?;
            Ok(StagedMarkup { file })
        })
        .await
        .map_err(|e| TemplateError::Internal(format!("staging task failed: {}", e)))?
        .map_err(TemplateError::from)
    }

    /// Make a staged payload visible under `code`, replacing any stale file
    pub fn publish(&self, staged: StagedMarkup, code: &str) -> TemplateResult<PathBuf> {
        let path = self
            .path_for(code)
            .ok_or_else(|| TemplateError::Internal(format!("invalid storage code: {}", code)))?;
        staged
            .file
            .persist(&path)
            .map_err(|e| TemplateError::from(e.error))?;
        Ok(path)
    }

    /// Read the payload for `code`; `None` if it is not stored
    pub async fn read(&self, code: &str) -> TemplateResult<Option<String>> {
        let Some(path) = self.path_for(code) else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(markup) => Ok(Some(markup)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the payload for `code`; returns whether a file was removed
    pub async fn remove(&self, code: &str) -> TemplateResult<bool> {
        let Some(path) = self.path_for(code) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

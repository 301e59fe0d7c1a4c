//! Template archive extraction.
//!
//! An uploaded template is a flat zip archive holding exactly one markup
//! entry (`.html`) and one configuration entry (`.json`). Entries are
//! materialized to private temporary files that are removed when the
//! [`ExtractedArchive`] is dropped, on every exit path of an import.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::read::ZipArchive;

use super::types::{ArchiveFormatError, TemplateError, TemplateResult};

/// Extension of the markup entry
pub const MARKUP_EXTENSION: &str = ".html";

/// Extension of the configuration entry
pub const CONFIG_EXTENSION: &str = ".json";

/// Number of entries a template archive must contain
const EXPECTED_ENTRIES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Markup,
    Config,
}

impl EntryKind {
    fn of(name: &str) -> Option<Self> {
        if name.ends_with(MARKUP_EXTENSION) {
            Some(EntryKind::Markup)
        } else if name.ends_with(CONFIG_EXTENSION) {
            Some(EntryKind::Config)
        } else {
            None
        }
    }
}

/// The two payloads of an accepted archive
#[derive(Debug)]
pub struct ExtractedArchive {
    markup: NamedTempFile,
    config: NamedTempFile,
}

impl ExtractedArchive {
    /// Path of the temporary markup payload
    pub fn markup_path(&self) -> &Path {
        self.markup.path()
    }

    /// Path of the temporary configuration payload
    pub fn config_path(&self) -> &Path {
        self.config.path()
    }

    /// Read the configuration payload
    pub fn read_config(&self) -> io::Result<Vec<u8>> {
        std::fs::read(self.config.path())
    }

    /// Read the markup payload
    pub fn read_markup(&self) -> io::Result<Vec<u8>> {
        std::fs::read(self.markup.path())
    }
}

/// Extract and validate a template archive.
///
/// Shape violations are decided from entry metadata before anything is
/// written, in this order: directory entries, unsupported extensions,
/// entry count, then one entry of each kind.
pub fn extract_all(archive_bytes: &[u8]) -> TemplateResult<ExtractedArchive> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|_| ArchiveFormatError::NotAnArchive)?;

    let mut kinds = Vec::with_capacity(archive.len());
    let mut unsupported = false;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|_| ArchiveFormatError::NotAnArchive)?;

        if entry.is_dir() {
            return Err(ArchiveFormatError::ContainsDirectory.into());
        }

        match EntryKind::of(entry.name()) {
            Some(kind) => kinds.push((index, kind)),
            None => unsupported = true,
        }
    }

    if unsupported {
        return Err(ArchiveFormatError::UnsupportedEntryExtension.into());
    }
    if kinds.len() < EXPECTED_ENTRIES {
        return Err(ArchiveFormatError::TooFewEntries.into());
    }
    if kinds.len() > EXPECTED_ENTRIES {
        return Err(ArchiveFormatError::TooManyEntries.into());
    }

    let markup_index = find_single(&kinds, EntryKind::Markup)?;
    let config_index = find_single(&kinds, EntryKind::Config)?;

    let markup = materialize(&mut archive, markup_index)?;
    let config = materialize(&mut archive, config_index)?;

    tracing::debug!(
        markup = %markup.path().display(),
        config = %config.path().display(),
        "Template archive extracted"
    );

    Ok(ExtractedArchive { markup, config })
}

fn find_single(kinds: &[(usize, EntryKind)], wanted: EntryKind) -> TemplateResult<usize> {
    let mut matching = kinds.iter().filter(|(_, kind)| *kind == wanted);
    match (matching.next(), matching.next()) {
        (Some((index, _)), None) => Ok(*index),
        _ => Err(ArchiveFormatError::UnsupportedEntryExtension.into()),
    }
}

fn materialize<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> TemplateResult<NamedTempFile> {
    let mut entry = archive
        .by_index(index)
        .map_err(|_| ArchiveFormatError::NotAnArchive)?;

    let mut file = NamedTempFile::new()?;
    match io::copy(&mut entry, &mut file) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Err(ArchiveFormatError::NotAnArchive.into());
        }
        Err(e) => return Err(TemplateError::from(e)),
    }
    file.flush()?;
    file.as_file_mut().seek(SeekFrom::Start(0))?;

    Ok(file)
}

//! Template types and error definitions

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Reason an uploaded archive was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormatError {
    NotAnArchive,
    ContainsDirectory,
    UnsupportedEntryExtension,
    TooFewEntries,
    TooManyEntries,
}

impl ArchiveFormatError {
    pub fn reason(&self) -> &'static str {
        match self {
            ArchiveFormatError::NotAnArchive => "not-an-archive",
            ArchiveFormatError::ContainsDirectory => "contains-directory",
            ArchiveFormatError::UnsupportedEntryExtension => "unsupported-entry-extension",
            ArchiveFormatError::TooFewEntries => "too-few-entries",
            ArchiveFormatError::TooManyEntries => "too-many-entries",
        }
    }
}

impl fmt::Display for ArchiveFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Reason a render request does not satisfy the template's parameter contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidArgumentsReason {
    Duplicate,
    MissingRequiredParameters,
    ExtraParameters,
}

impl InvalidArgumentsReason {
    pub fn reason(&self) -> &'static str {
        match self {
            InvalidArgumentsReason::Duplicate => "duplicate",
            InvalidArgumentsReason::MissingRequiredParameters => "missing-required-parameters",
            InvalidArgumentsReason::ExtraParameters => "extra-parameters",
        }
    }
}

impl fmt::Display for InvalidArgumentsReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Field-path addressed constraint violations, e.g. `parameters[0].name`.
///
/// Several violations on the same field are joined with a single space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        self.0
            .entry(field.into())
            .and_modify(|existing| {
                existing.push(' ');
                existing.push_str(&message);
            })
            .or_insert(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid zip format: {0}")]
    InvalidArchive(ArchiveFormatError),

    #[error("Invalid template configuration format")]
    InvalidConfigFormat,

    #[error("Invalid template configuration: {0}")]
    InvalidConfig(FieldErrors),

    #[error("Invalid template markup: {0}")]
    InvalidMarkup(String),

    #[error("Template code already exists: {0}")]
    CodeAlreadyExists(String),

    #[error("Template name already exists: {0}")]
    NameAlreadyExists(String),

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid template arguments: {0}")]
    InvalidArguments(InvalidArgumentsReason),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TemplateError {
    /// Stable machine-readable reason for this error
    pub fn reason(&self) -> &'static str {
        match self {
            TemplateError::InvalidArchive(e) => e.reason(),
            TemplateError::InvalidConfigFormat => "invalid-config-format",
            TemplateError::InvalidConfig(_) => "validation-error",
            TemplateError::InvalidMarkup(_) => "invalid-markup",
            TemplateError::CodeAlreadyExists(_) => "template-code-already-exists",
            TemplateError::NameAlreadyExists(_) => "template-name-already-exists",
            TemplateError::NotFound(_) => "template-not-found",
            TemplateError::FileNotFound(_) => "template-file-not-found",
            TemplateError::InvalidArguments(r) => r.reason(),
            TemplateError::Internal(_) => "internal-error",
        }
    }
}

impl From<ArchiveFormatError> for TemplateError {
    fn from(err: ArchiveFormatError) -> Self {
        TemplateError::InvalidArchive(err)
    }
}

impl From<InvalidArgumentsReason> for TemplateError {
    fn from(reason: InvalidArgumentsReason) -> Self {
        TemplateError::InvalidArguments(reason)
    }
}

impl From<std::io::Error> for TemplateError {
    fn from(err: std::io::Error) -> Self {
        TemplateError::Internal(format!("I/O error: {}", err))
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

fn default_required() -> bool {
    true
}

/// A parameter declared by a template.
///
/// Identity is the name alone; `required` does not take part in uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(default = "default_required")]
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

impl PartialEq for ParameterSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ParameterSpec {}

/// Insertion-ordered set of parameters, unique by name. The first
/// declaration of a name wins; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ParameterSpec>", into = "Vec<ParameterSpec>")]
pub struct ParameterSet(Vec<ParameterSpec>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter; returns false if one with the same name exists.
    pub fn insert(&mut self, spec: ParameterSpec) -> bool {
        if self.contains(&spec.name) {
            return false;
        }
        self.0.push(spec);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ParameterSpec>> for ParameterSet {
    fn from(specs: Vec<ParameterSpec>) -> Self {
        specs.into_iter().collect()
    }
}

impl From<ParameterSet> for Vec<ParameterSpec> {
    fn from(set: ParameterSet) -> Self {
        set.0
    }
}

impl FromIterator<ParameterSpec> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = ParameterSpec>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for spec in iter {
            set.insert(spec);
        }
        set
    }
}

/// The persisted record of a template's identity, metadata and parameter contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Internally generated identifier
    pub id: Uuid,

    /// Display name, unique across templates
    pub name: String,

    /// Storage and lookup key, unique, `[a-z0-9_]*`
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub parameters: ParameterSet,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TemplateDescriptor {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        description: Option<String>,
        parameters: ParameterSet,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.into(),
            description,
            parameters,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A supplied `{name, value}` pair of a render request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
}

impl ParameterValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request to render a stored template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub code: String,

    #[serde(default)]
    pub parameters: Vec<ParameterValue>,
}

/// Validated name -> value mapping used for rendering
pub type Bindings = HashMap<String, String>;

/// Public view of a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOutput {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub parameters: Vec<ParameterSpec>,
}

impl From<TemplateDescriptor> for TemplateOutput {
    fn from(descriptor: TemplateDescriptor) -> Self {
        Self {
            name: descriptor.name,
            code: descriptor.code,
            description: descriptor.description,
            parameters: descriptor.parameters.into(),
        }
    }
}

/// Page query as received from callers; out-of-range values are normalised
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

impl PageQuery {
    /// Returns `(offset, limit)`; page defaults to 0 and page size to 1.
    pub fn offset_limit(&self) -> (u64, u64) {
        let page = self.page.filter(|p| *p >= 0).unwrap_or(0) as u64;
        let size = self.page_size.filter(|s| *s >= 1).unwrap_or(1) as u64;
        (page.saturating_mul(size), size)
    }
}

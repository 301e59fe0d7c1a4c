//! Template configuration parsing and field validation

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::types::{
    FieldErrors, ParameterSet, ParameterSpec, TemplateDescriptor, TemplateError, TemplateResult,
};

pub const TEMPLATE_CODE_PATTERN: &str = "^[a-z0-9_]*$";
pub const TEMPLATE_CODE_MIN_LENGTH: usize = 1;
pub const TEMPLATE_CODE_MAX_LENGTH: usize = 255;
pub const TEMPLATE_NAME_MIN_LENGTH: usize = 1;
pub const TEMPLATE_NAME_MAX_LENGTH: usize = 255;
pub const PARAMETER_NAME_MIN_LENGTH: usize = 1;
pub const PARAMETER_NAME_MAX_LENGTH: usize = 255;

lazy_static! {
    static ref TEMPLATE_CODE_REGEX: Regex =
        Regex::new(TEMPLATE_CODE_PATTERN).expect("template code pattern is valid");
}

/// Raw configuration payload. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TemplateConfig {
    name: Option<String>,
    code: Option<String>,
    description: Option<String>,
    #[serde(default)]
    parameters: Option<Vec<ParameterConfig>>,
}

#[derive(Debug, Deserialize)]
struct ParameterConfig {
    name: Option<String>,
    required: Option<bool>,
}

/// Parse a configuration payload and validate its fields.
///
/// Bytes that do not deserialize into the configuration shape yield
/// [`TemplateError::InvalidConfigFormat`]; field constraint failures are
/// collected into a single [`TemplateError::InvalidConfig`].
pub fn parse_and_validate(config_bytes: &[u8]) -> TemplateResult<TemplateDescriptor> {
    let config: TemplateConfig = serde_json::from_slice(config_bytes).map_err(|e| {
        tracing::debug!(error = %e, "Template configuration is not valid JSON");
        TemplateError::InvalidConfigFormat
    })?;

    let mut errors = FieldErrors::new();
    validate_length(
        &mut errors,
        "name",
        config.name.as_deref(),
        TEMPLATE_NAME_MIN_LENGTH,
        TEMPLATE_NAME_MAX_LENGTH,
    );
    validate_length(
        &mut errors,
        "code",
        config.code.as_deref(),
        TEMPLATE_CODE_MIN_LENGTH,
        TEMPLATE_CODE_MAX_LENGTH,
    );
    if let Some(code) = config.code.as_deref() {
        if !TEMPLATE_CODE_REGEX.is_match(code) {
            errors.add("code", format!("must match {}", TEMPLATE_CODE_PATTERN));
        }
    }

    let parameters = config.parameters.unwrap_or_default();
    for (index, parameter) in parameters.iter().enumerate() {
        validate_length(
            &mut errors,
            &format!("parameters[{}].name", index),
            parameter.name.as_deref(),
            PARAMETER_NAME_MIN_LENGTH,
            PARAMETER_NAME_MAX_LENGTH,
        );
    }

    if !errors.is_empty() {
        return Err(TemplateError::InvalidConfig(errors));
    }

    let (Some(name), Some(code)) = (config.name, config.code) else {
        return Err(TemplateError::InvalidConfigFormat);
    };

    let parameters: ParameterSet = parameters
        .into_iter()
        .filter_map(|p| {
            p.name.map(|name| ParameterSpec {
                name,
                required: p.required.unwrap_or(true),
            })
        })
        .collect();

    Ok(TemplateDescriptor::new(
        name,
        code,
        config.description,
        parameters,
    ))
}

fn validate_length(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) {
    match value {
        None => errors.add(field, "must not be null"),
        Some(value) => {
            let length = value.chars().count();
            if length < min || length > max {
                errors.add(
                    field,
                    format!("length must be between {} and {}", min, max),
                );
            }
        }
    }
}

//! Template import, render and management endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::Serialize;

use crate::server::AppState;
use crate::template::{PageQuery, RenderRequest, TemplateError, TemplateOutput};

/// Multipart part carrying the template archive
pub const ARCHIVE_PART: &str = "data";

#[derive(Debug, Serialize)]
pub struct TemplateErrorResponse {
    pub error: TemplateErrorInfo,
}

#[derive(Debug, Serialize)]
pub struct TemplateErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

type ApiError = (StatusCode, Json<TemplateErrorResponse>);

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(TemplateErrorResponse {
            error: TemplateErrorInfo {
                code: code.to_string(),
                message: message.into(),
                errors: None,
            },
        }),
    )
}

impl From<TemplateError> for (StatusCode, Json<TemplateErrorResponse>) {
    fn from(err: TemplateError) -> Self {
        let status = match &err {
            TemplateError::InvalidArchive(_)
            | TemplateError::InvalidConfigFormat
            | TemplateError::InvalidConfig(_)
            | TemplateError::InvalidMarkup(_)
            | TemplateError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
            TemplateError::CodeAlreadyExists(_) | TemplateError::NameAlreadyExists(_) => {
                StatusCode::CONFLICT
            }
            TemplateError::NotFound(_) | TemplateError::FileNotFound(_) => StatusCode::NOT_FOUND,
            TemplateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let errors = match &err {
            TemplateError::InvalidConfig(fields) => Some(fields.as_map().clone()),
            _ => None,
        };

        let message = match &err {
            TemplateError::Internal(_) if crate::error::is_production() => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(TemplateErrorResponse {
                error: TemplateErrorInfo {
                    code: err.reason().to_string(),
                    message,
                    errors,
                },
            }),
        )
    }
}

/// POST /api/v0/template/import - Import a template archive
#[tracing::instrument(name = "http.import_template", skip(state, multipart))]
pub async fn import_template(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TemplateOutput>, ApiError> {
    let mut archive = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(e.status(), "invalid-multipart", e.body_text()))?
    {
        if field.name() == Some(ARCHIVE_PART) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| error_response(e.status(), "invalid-multipart", e.body_text()))?;
            archive = Some(bytes.to_vec());
            break;
        }
    }

    let Some(archive) = archive else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "missing-request-part",
            format!("Required request part '{}' is not present", ARCHIVE_PART),
        ));
    };

    let descriptor = state
        .template_service
        .import_template(archive)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(descriptor.into()))
}

/// POST /api/v0/template/render - Render a template to HTML
#[tracing::instrument(name = "http.render_template", skip(state, request), fields(code = %request.code))]
pub async fn render_template(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Html<String>, ApiError> {
    state
        .template_service
        .render_template(&request)
        .await
        .map(Html)
        .map_err(ApiError::from)
}

/// GET /api/v0/template - List templates ordered by name
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<TemplateOutput>>, ApiError> {
    state
        .template_service
        .get_templates(query)
        .await
        .map(Json)
        .map_err(ApiError::from)
}

/// GET /api/v0/template/{code} - Get a specific template
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<TemplateOutput>, ApiError> {
    state
        .template_service
        .get_template(&code)
        .await
        .map(Json)
        .map_err(ApiError::from)
}

/// DELETE /api/v0/template/{code} - Delete a template and its markup
#[tracing::instrument(name = "http.delete_template", skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .template_service
        .delete_template(&code)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(ApiError::from)
}

//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::error::AppError;
use crate::metrics::{self, TemplateMetrics};
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    update_metrics_from_state(&state).await;

    let output = metrics::encode_metrics()
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}

/// Refresh gauges that are sampled rather than counted
async fn update_metrics_from_state(state: &AppState) {
    match state.template_service.repository().count().await {
        Ok(count) => TemplateMetrics::set_stored(count),
        Err(e) => tracing::warn!(error = %e, "Failed to count stored templates"),
    }
}

//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub repository: RepositoryHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct RepositoryHealthResponse {
    pub backend: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub pool_size: u32,
    pub idle_connections: u32,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let repository = state.template_service.repository();

    let templates = match repository.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Template repository health check failed");
            None
        }
    };
    let available = templates.is_some();

    let postgres = state.postgres_pool.as_ref().map(|pool| {
        let inner_pool = pool.pool();
        PostgresHealthResponse {
            pool_size: inner_pool.size(),
            idle_connections: inner_pool.num_idle() as u32,
        }
    });

    let status = if available { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        repository: RepositoryHealthResponse {
            backend: repository.backend_type().to_string(),
            available,
            templates,
        },
        postgres,
    })
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::health::health;
use super::metrics::prometheus_metrics;
use super::template::{
    delete_template, get_template, import_template, list_templates, render_template,
};

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Public template API, gated by the optional API key
    let template_api = Router::new()
        .route("/api/v0/template", get(list_templates))
        .route("/api/v0/template/import", post(import_template))
        .route("/api/v0/template/render", post(render_template))
        .route(
            "/api/v0/template/{code}",
            get(get_template).delete(delete_template),
        )
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Internal render route for trusted callers
        .route("/sys/v0/template/render", post(render_template))
        .merge(template_api)
}

//! Prometheus metrics for the template service.
//!
//! - Import metrics (imported, failures by reason)
//! - Render metrics (rendered, failures by reason, latency)
//! - Delete metrics

mod helpers;

pub use helpers::{encode_metrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "template";

lazy_static! {
    // ============================================================================
    // Import Metrics
    // ============================================================================

    /// Total templates imported successfully
    pub static ref TEMPLATES_IMPORTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_imported_total", METRIC_PREFIX),
        "Total templates imported successfully"
    ).unwrap();

    /// Total rejected or failed imports by reason
    pub static ref TEMPLATE_IMPORT_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_import_failures_total", METRIC_PREFIX),
        "Total failed template imports",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Total templates rendered successfully
    pub static ref TEMPLATES_RENDERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_rendered_total", METRIC_PREFIX),
        "Total templates rendered successfully"
    ).unwrap();

    /// Total rejected or failed renders by reason
    pub static ref TEMPLATE_RENDER_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_render_failures_total", METRIC_PREFIX),
        "Total failed template renders",
        &["reason"]
    ).unwrap();

    /// Render latency in seconds
    pub static ref TEMPLATE_RENDER_DURATION: Histogram = register_histogram!(
        format!("{}_render_duration_seconds", METRIC_PREFIX),
        "Template render latency in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();

    // ============================================================================
    // Management Metrics
    // ============================================================================

    /// Total templates deleted
    pub static ref TEMPLATES_DELETED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deleted_total", METRIC_PREFIX),
        "Total templates deleted"
    ).unwrap();

    /// Number of stored templates (refreshed on scrape)
    pub static ref TEMPLATES_STORED: IntGauge = register_int_gauge!(
        format!("{}_stored", METRIC_PREFIX),
        "Number of stored templates"
    ).unwrap();
}

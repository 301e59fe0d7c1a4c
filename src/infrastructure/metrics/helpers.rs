//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    TEMPLATES_DELETED_TOTAL, TEMPLATES_IMPORTED_TOTAL, TEMPLATES_RENDERED_TOTAL, TEMPLATES_STORED,
    TEMPLATE_IMPORT_FAILURES_TOTAL, TEMPLATE_RENDER_DURATION, TEMPLATE_RENDER_FAILURES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_imported() {
        TEMPLATES_IMPORTED_TOTAL.inc();
    }

    pub fn record_import_failed(reason: &str) {
        TEMPLATE_IMPORT_FAILURES_TOTAL
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a successful render and its latency
    pub fn record_rendered(elapsed: Duration) {
        TEMPLATES_RENDERED_TOTAL.inc();
        TEMPLATE_RENDER_DURATION.observe(elapsed.as_secs_f64());
    }

    pub fn record_render_failed(reason: &str) {
        TEMPLATE_RENDER_FAILURES_TOTAL
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_deleted() {
        TEMPLATES_DELETED_TOTAL.inc();
    }

    pub fn set_stored(count: u64) {
        TEMPLATES_STORED.set(count as i64);
    }
}

//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod routes;
mod template;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use template::{
    delete_template, get_template, import_template, list_templates, render_template,
    TemplateErrorInfo, TemplateErrorResponse,
};

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::postgres::PostgresPool;
use crate::template::TemplateService;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub template_service: Arc<TemplateService>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        template_service: Arc<TemplateService>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            template_service,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}

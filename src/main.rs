use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use template_service::config::Settings;
use template_service::postgres::PostgresPool;
use template_service::server::{create_app, AppState};
use template_service::telemetry::init_telemetry;
use template_service::template::{
    create_template_repository, MarkupStore, PostgresTemplateRepository, TemplateService,
    TeraRenderEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (and OTLP export when enabled)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Markup payload storage
    let store = Arc::new(
        MarkupStore::init(&settings.storage.path)
            .with_context(|| format!("failed to open storage at {}", settings.storage.path))?,
    );

    // Optional PostgreSQL pool
    let postgres_pool = if settings.uses_postgres() {
        let pool = PostgresPool::new(&settings.database).await?;
        PostgresTemplateRepository::new(pool.pool().clone())
            .ensure_schema()
            .await?;
        Some(Arc::new(pool))
    } else {
        None
    };

    let repository = create_template_repository(&settings.repository, postgres_pool.clone());
    let template_service = Arc::new(TemplateService::new(
        repository,
        store,
        Arc::new(TeraRenderEngine::new()),
    ));

    // Create application state
    let state = AppState::new(settings.clone(), template_service, postgres_pool.clone());
    tracing::info!("Application state initialized");

    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

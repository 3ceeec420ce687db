use anyhow::{Context, Result};
use file_service::{
    config::{AppConfig, Environment},
    observability, routes,
    services::{FileService, object_store, postgres_store::PgMetadataStore},
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Load .env when present ---
    dotenvy::dotenv().ok();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    // --- Logging + metrics setup ---
    let _log_guard =
        observability::init_tracing(cfg.log_format, cfg.log_file.as_ref(), cfg.log_to_console())?;
    observability::init_metrics(cfg.metrics_addr())?;

    tracing::info!("Starting file-service with config: {:?}", cfg);

    // --- Metadata store (connects lazily) ---
    let metadata = PgMetadataStore::connect_lazy(&cfg.database)?;

    // --- Handle migration mode ---
    if migrate {
        metadata.migrate().await.context("running migrations")?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    if cfg.environment != Environment::Test {
        // A database that is down at boot must not keep the service down;
        // /healthz reports 503 until it recovers.
        if let Err(err) = metadata.migrate().await {
            tracing::warn!(error = %err, "Startup migration failed; continuing");
        }
    }

    // --- Object store ---
    let objects = object_store::connect(&cfg.object_store).await?;
    tracing::info!("Object store backend: {}", objects.backend());

    // --- Build router ---
    let service = FileService::new(objects, Arc::new(metadata));
    let app = routes::app(service, cfg.max_upload_bytes);

    if cfg.environment == Environment::Test {
        tracing::info!("APP_ENV=test; not binding a listener");
        return Ok(());
    }

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

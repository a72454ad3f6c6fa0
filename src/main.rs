// Main entry point for the image text translation service

use livetext_translator::{
    core::Config, orchestration::PipelineOrchestrator, server, utils::Metrics,
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing credentials stop the process here, before anything is served
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "livetext_translator={level},livetext_translator::server=info,tower_http={level}",
        level = match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== LIVETEXT TRANSLATOR ===");
    info!(
        "Config: region={} OCR poll={:?} (backoff x{}, max {:?}) deadline={:?}",
        config.credentials().region,
        config.ocr.poll_interval,
        config.ocr.poll_backoff,
        config.ocr.poll_max_interval,
        config.ocr.timeout
    );

    let metrics = Metrics::new();
    let orchestrator = Arc::new(PipelineOrchestrator::new(&config, metrics.clone())?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = server::AppState {
        config: config.clone(),
        orchestrator,
        metrics,
        shutdown: shutdown_rx,
    };
    let app = server::router(state);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(60));
    info!("Server starting on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /         - Liveness text");
    info!("  POST /         - Translate image text (multipart: file, targetLang)");
    info!("  GET  /health   - Health check");
    info!("  GET  /metrics  - Prometheus metrics");
    info!("  GET  /stats    - Detailed statistics");
    info!("{}", "=".repeat(60));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down, cancelling in-flight requests");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trawl_client::EndpointConfig;
use trawl_core::OrchestratorConfig;
use trawl_server::routes;
use trawl_server::state::{AppState, join_background};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trawl=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("TRAWL_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = OrchestratorConfig::from_env().context("Invalid orchestrator configuration")?;
    let endpoints = EndpointConfig::from_env().context("Invalid worker endpoint configuration")?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(&config, &endpoints, shutdown.clone())?);

    let sweeper = (!config.job_retention.is_zero()).then(|| {
        state
            .registry()
            .spawn_sweeper(SWEEP_INTERVAL, shutdown.child_token())
    });

    let app = routes::router(Arc::clone(&state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(
        worker_url = %endpoints.worker_url,
        ai_url = %endpoints.ai_url,
        batch_size = config.batch.batch_size,
        retry_limit = config.retry.max_attempts,
        max_concurrent_jobs = ?config.max_concurrent_jobs,
        "Starting server on {addr}"
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    state.controller.shutdown();
    if let Some(sweeper) = sweeper {
        join_background("retention sweeper", sweeper).await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

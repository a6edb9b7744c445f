use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use trawl_client::{EndpointConfig, HttpAnalyzer, HttpScrapeWorker};
use trawl_core::error::AppError;
use trawl_core::{
    Admission, BatchScheduler, JobRegistry, OrchestratorConfig, PipelineController,
    RetryingFetcher,
};

pub type Controller = PipelineController<HttpScrapeWorker, HttpAnalyzer>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub controller: Controller,
    pub scheduler: BatchScheduler<HttpScrapeWorker>,
    /// Cancelled on shutdown; parent of every batch and job token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires the workers, registry, controller and scheduler together.
    pub fn new(
        config: &OrchestratorConfig,
        endpoints: &EndpointConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, AppError> {
        let worker = HttpScrapeWorker::from_config(endpoints)?;
        let analyzer = HttpAnalyzer::from_config(endpoints)?;
        let registry = Arc::new(JobRegistry::with_retention(config.job_retention));

        let controller = PipelineController::new(registry, worker.clone(), analyzer)
            .with_admission(Admission::from_limit(config.max_concurrent_jobs))
            .with_job_timeout(config.job_timeout)
            .with_shutdown_token(shutdown.child_token());

        let scheduler = BatchScheduler::new(
            RetryingFetcher::new(worker, config.retry.clone()),
            config.batch.clone(),
        );

        Ok(Self {
            controller,
            scheduler,
            shutdown,
        })
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.controller.registry()
    }
}

/// Waits for a background task to stop, logging it if it panicked or was aborted.
///
/// Returns `true` when the task ended normally.
pub async fn join_background(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(task = name, error = %e, "Background task ended abnormally");
            false
        }
    }
}

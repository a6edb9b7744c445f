//! Fixed-size batch fan-out over the retrying fetcher.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{ScrapeTarget, ScrapingResult};
use crate::retry::RetryingFetcher;
use crate::traits::ScrapeWorker;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Targets fetched concurrently; also the in-flight ceiling.
    pub batch_size: usize,
    /// Pause between consecutive batches (not after the last one).
    pub batch_pause: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause: Duration::from_millis(500),
        }
    }
}

impl BatchConfig {
    pub fn new(batch_size: usize, batch_pause: Duration) -> Self {
        Self {
            batch_size,
            batch_pause,
        }
    }
}

/// Runs many targets through a [`RetryingFetcher`] in ordered batches.
#[derive(Clone)]
pub struct BatchScheduler<W> {
    fetcher: RetryingFetcher<W>,
    config: BatchConfig,
}

impl<W: ScrapeWorker> BatchScheduler<W> {
    pub fn new(fetcher: RetryingFetcher<W>, config: BatchConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Scrape every target, returning one result per target in input order.
    ///
    /// Individual failures, including a panicking fetch task, are embedded in
    /// the results. The call itself only fails when the targets cannot be
    /// partitioned (`batch_size == 0`). Once `cancel` fires, targets that have
    /// not been fetched yet come back as cancelled failures.
    pub async fn scrape_many(
        &self,
        targets: &[ScrapeTarget],
        cancel: &CancellationToken,
    ) -> Result<Vec<ScrapingResult>, AppError> {
        let batch_size = self.config.batch_size;
        if batch_size == 0 {
            return Err(AppError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }

        // Spawned fetches stop if this future is dropped before they settle.
        let scope = cancel.child_token();
        let _abort_on_drop = scope.clone().drop_guard();
        let cancel = &scope;

        let total_batches = targets.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(targets.len());

        tracing::info!(
            targets = targets.len(),
            batches = total_batches,
            batch_size,
            "Starting batch scrape"
        );

        for (index, batch) in targets.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                results.extend(
                    batch
                        .iter()
                        .map(|t| ScrapingResult::failure(&t.url, AppError::Cancelled.to_string())),
                );
                continue;
            }

            let handles: Vec<_> = batch
                .iter()
                .cloned()
                .map(|target| {
                    let fetcher = self.fetcher.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move { fetcher.fetch_target(&target, &cancel).await })
                })
                .collect();

            let settled = join_all(handles).await;

            let mut failed = 0usize;
            for (target, outcome) in batch.iter().zip(settled) {
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(url = %target.url, error = %e, "Scrape task aborted");
                        ScrapingResult::failure(&target.url, format!("Scrape task failed: {e}"))
                    }
                };
                if !result.success {
                    failed += 1;
                }
                results.push(result);
            }

            tracing::info!(
                batch = index + 1,
                of = total_batches,
                succeeded = batch.len() - failed,
                failed,
                "Batch settled"
            );

            if index + 1 < total_batches && !self.config.batch_pause.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(self.config.batch_pause) => {}
                }
            }
        }

        Ok(results)
    }
}

//! Bounded retries with linear backoff around a single extraction call.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{FetchOptions, ScrapeTarget, ScrapingResult, SelectorConfig};
use crate::traits::ScrapeWorker;

/// Retry configuration with linear backoff.
///
/// Delay before attempt `n + 1` is `retry_delay * n`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Wraps a [`ScrapeWorker`] so that every call settles into a [`ScrapingResult`].
///
/// Never returns an error: transport errors, worker errors and
/// `success: false` results are all retried, and the last failure is
/// reported in the returned result.
#[derive(Clone)]
pub struct RetryingFetcher<W> {
    worker: W,
    config: RetryConfig,
}

impl<W: ScrapeWorker> RetryingFetcher<W> {
    pub fn new(worker: W, config: RetryConfig) -> Self {
        Self { worker, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn fetch_target(
        &self,
        target: &ScrapeTarget,
        cancel: &CancellationToken,
    ) -> ScrapingResult {
        self.fetch(
            &target.url,
            &target.selectors,
            target.options.as_ref(),
            cancel,
        )
        .await
    }

    pub async fn fetch(
        &self,
        url: &str,
        selectors: &[SelectorConfig],
        options: Option<&FetchOptions>,
        cancel: &CancellationToken,
    ) -> ScrapingResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();
        let mut last_result: Option<ScrapingResult> = None;

        for attempt in 1..=max_attempts {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(url),
                outcome = self.worker.extract(url, selectors, options) => outcome,
            };

            match outcome {
                Ok(mut result) if result.success => {
                    if attempt > 1 {
                        tracing::debug!(%url, attempt, "Scrape succeeded after retry");
                    }
                    result.url = url.to_string();
                    return result;
                }
                Ok(result) => {
                    last_error = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "Extraction worker reported failure".to_string());
                    last_result = Some(result);
                }
                Err(e) => {
                    last_error = e.to_string();
                    last_result = None;
                }
            }

            if attempt < max_attempts {
                let delay = self.config.delay_for_attempt(attempt);
                tracing::warn!(
                    %url,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Scrape attempt failed, retrying"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return cancelled(url),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::warn!(%url, attempts = max_attempts, error = %last_error, "Scrape retries exhausted");

        match last_result {
            Some(mut result) => {
                result.url = url.to_string();
                result.error = Some(last_error);
                result
            }
            None => ScrapingResult::failure(url, last_error),
        }
    }
}

fn cancelled(url: &str) -> ScrapingResult {
    ScrapingResult::failure(url, AppError::Cancelled.to_string())
}

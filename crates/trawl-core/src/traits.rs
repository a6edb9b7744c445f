use std::future::Future;

use crate::error::AppError;
use crate::job::{AnalysisRequest, PageRequest, PageSnapshot};
use crate::models::{AnalysisResult, FetchOptions, ScrapingResult, SelectorConfig};

/// The external fetch/extract worker.
///
/// Ordinary fetch failures should come back as `Ok` with `success: false`;
/// an `Err` means the call itself did not go through. Callers treat both the
/// same way.
pub trait ScrapeWorker: Send + Sync + Clone + 'static {
    /// Fetches one URL and applies the selector list to it.
    fn extract(
        &self,
        url: &str,
        selectors: &[SelectorConfig],
        options: Option<&FetchOptions>,
    ) -> impl Future<Output = Result<ScrapingResult, AppError>> + Send;

    /// Fetches one URL and fills the job result buckets.
    fn scrape_page(
        &self,
        request: &PageRequest<'_>,
    ) -> impl Future<Output = Result<PageSnapshot, AppError>> + Send;
}

/// The external AI-analysis worker (sentiment, entities, summary, keywords).
pub trait Analyzer: Send + Sync + Clone + 'static {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResult, AppError>> + Send;
}

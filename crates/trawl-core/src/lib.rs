pub mod batch;
pub mod config;
pub mod error;
pub mod job;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use batch::{BatchConfig, BatchScheduler};
pub use config::OrchestratorConfig;
pub use error::AppError;
pub use job::{Job, JobStatus, ScrapeOptions, Stage};
pub use models::{AiOptions, AnalysisResult, ScrapeTarget, ScrapingResult};
pub use pipeline::{Admission, PipelineController, PipelineReporter, TracingPipelineReporter};
pub use registry::JobRegistry;
pub use retry::{RetryConfig, RetryingFetcher};
pub use traits::{Analyzer, ScrapeWorker};

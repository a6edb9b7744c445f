use std::str::FromStr;
use std::time::Duration;

use crate::batch::BatchConfig;
use crate::error::AppError;
use crate::retry::RetryConfig;

/// Tunables for the orchestration engine.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    /// How long terminal jobs are kept. Zero keeps them forever.
    pub job_retention: Duration,
    /// `None` admits every job immediately.
    pub max_concurrent_jobs: Option<usize>,
    /// Default per-job deadline. `None` means no deadline.
    pub job_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            job_retention: Duration::from_secs(3600),
            max_concurrent_jobs: None,
            job_timeout: None,
        }
    }
}

impl OrchestratorConfig {
    /// Read configuration from environment variables.
    ///
    /// - `TRAWL_RETRY_LIMIT` (defaults to 3, at least 1)
    /// - `TRAWL_RETRY_DELAY_MS` (defaults to 1000)
    /// - `TRAWL_BATCH_SIZE` (defaults to 5, at least 1)
    /// - `TRAWL_BATCH_PAUSE_MS` (defaults to 500)
    /// - `TRAWL_JOB_RETENTION_SECS` (defaults to 3600, 0 keeps jobs forever)
    /// - `TRAWL_MAX_CONCURRENT_JOBS` (optional, at least 1)
    /// - `TRAWL_JOB_TIMEOUT_SECS` (optional, at least 1)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_attempts = positive_var(&lookup, "TRAWL_RETRY_LIMIT")?
            .unwrap_or(defaults.retry.max_attempts);
        let retry_delay = parse_var::<u64, _>(&lookup, "TRAWL_RETRY_DELAY_MS")?
            .map_or(defaults.retry.retry_delay, Duration::from_millis);

        let batch_size = positive_var(&lookup, "TRAWL_BATCH_SIZE")?
            .unwrap_or(defaults.batch.batch_size);
        let batch_pause = parse_var::<u64, _>(&lookup, "TRAWL_BATCH_PAUSE_MS")?
            .map_or(defaults.batch.batch_pause, Duration::from_millis);

        let job_retention = parse_var::<u64, _>(&lookup, "TRAWL_JOB_RETENTION_SECS")?
            .map_or(defaults.job_retention, Duration::from_secs);
        let max_concurrent_jobs = positive_var(&lookup, "TRAWL_MAX_CONCURRENT_JOBS")?;
        let job_timeout =
            positive_var::<u64, _>(&lookup, "TRAWL_JOB_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            retry: RetryConfig::new(max_attempts, retry_delay),
            batch: BatchConfig::new(batch_size, batch_pause),
            job_retention,
            max_concurrent_jobs,
            job_timeout,
        })
    }
}

/// Parses an optional variable. Empty values count as unset.
pub fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {name} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

/// Like [`parse_var`], but zero is rejected.
pub fn positive_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, AppError>
where
    T: FromStr + Default + PartialEq,
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<T, F>(lookup, name)? {
        Some(value) if value == T::default() => Err(AppError::ConfigError(format!(
            "{name} must be at least 1"
        ))),
        other => Ok(other),
    }
}

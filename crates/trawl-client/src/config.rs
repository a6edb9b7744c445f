use std::time::Duration;

use trawl_core::AppError;
use trawl_core::config::positive_var;
use url::Url;

/// Where the external workers live.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub worker_url: String,
    pub ai_url: String,
    pub ai_api_key: Option<String>,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(worker_url: &str) -> Result<Self, AppError> {
        let worker_url = normalize_base_url("TRAWL_WORKER_URL", worker_url)?;
        Ok(Self {
            ai_url: worker_url.clone(),
            worker_url,
            ai_api_key: None,
            timeout: Duration::from_secs(30),
        })
    }

    /// Read configuration from environment variables.
    ///
    /// - `TRAWL_WORKER_URL` (required)
    /// - `TRAWL_AI_URL` (optional, defaults to the worker URL)
    /// - `TRAWL_AI_API_KEY` (optional)
    /// - `TRAWL_HTTP_TIMEOUT_SECS` (optional, defaults to 30)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let worker_url = lookup("TRAWL_WORKER_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError(
                    "TRAWL_WORKER_URL not set. Required to reach the extraction worker.".into(),
                )
            })?;
        let mut config = Self::new(&worker_url)?;

        if let Some(ai_url) = lookup("TRAWL_AI_URL").filter(|v| !v.trim().is_empty()) {
            config.ai_url = normalize_base_url("TRAWL_AI_URL", &ai_url)?;
        }
        config.ai_api_key = lookup("TRAWL_AI_API_KEY").filter(|v| !v.trim().is_empty());
        if let Some(secs) = positive_var::<u64, _>(&lookup, "TRAWL_HTTP_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn normalize_base_url(name: &str, raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    let parsed = Url::parse(raw)
        .map_err(|e| AppError::ConfigError(format!("Invalid {name} '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::ConfigError(format!(
            "Invalid {name} '{raw}': only http and https are supported"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

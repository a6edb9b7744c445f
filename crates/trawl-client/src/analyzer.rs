use std::time::Duration;

use reqwest::Client;
use trawl_core::error::AppError;
use trawl_core::job::AnalysisRequest;
use trawl_core::models::AnalysisResult;
use trawl_core::traits::Analyzer;

use crate::config::EndpointConfig;
use crate::http;

const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

/// AI-analysis worker reached over HTTP at `POST {base}/analyze`.
#[derive(Clone)]
pub struct HttpAnalyzer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpAnalyzer {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, DEFAULT_ANALYSIS_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Sends `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, AppError> {
        let analyzer = Self::with_timeout(&config.ai_url, config.timeout)?;
        Ok(match &config.ai_api_key {
            Some(key) => analyzer.with_api_key(key.clone()),
            None => analyzer,
        })
    }
}

impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AppError> {
        let url = format!("{}/analyze", self.base_url);

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = http::send(builder, self.timeout_secs).await?;
        if !response.status().is_success() {
            let (status_code, message) = http::error_message(response).await;
            return Err(AppError::AnalysisError {
                message,
                status_code,
            });
        }

        let result: AnalysisResult = http::parse_json(response, "analysis").await?;
        tracing::debug!(
            job_id = %request.job_id,
            entities = result.entities.len(),
            keywords = result.keywords.len(),
            "Analysis received"
        );
        Ok(result)
    }
}

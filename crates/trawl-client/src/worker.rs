use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use trawl_core::error::AppError;
use trawl_core::job::{PageRequest, PageSnapshot};
use trawl_core::models::{FetchOptions, ScrapingResult, SelectorConfig};
use trawl_core::traits::ScrapeWorker;

use crate::config::EndpointConfig;
use crate::http;

/// Extraction worker reached over HTTP.
///
/// - `POST {base}/extract` runs a selector list against one URL.
/// - `POST {base}/scrape` fills the job buckets for one URL.
///
/// A `success: false` body is passed through as-is; only non-2xx answers
/// become [`AppError::WorkerError`].
#[derive(Clone)]
pub struct HttpScrapeWorker {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpScrapeWorker {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, AppError> {
        Self::with_timeout(&config.worker_url, config.timeout)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + Sync + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        let response = http::send(self.client.post(&url).json(body), self.timeout_secs).await?;

        if !response.status().is_success() {
            let (status_code, message) = http::error_message(response).await;
            tracing::debug!(%url, status_code, %message, "Extraction worker rejected request");
            return Err(AppError::WorkerError {
                message,
                status_code,
            });
        }

        http::parse_json(response, "extraction worker").await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest<'a> {
    url: &'a str,
    selectors: &'a [SelectorConfig],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a FetchOptions>,
}

impl ScrapeWorker for HttpScrapeWorker {
    async fn extract(
        &self,
        url: &str,
        selectors: &[SelectorConfig],
        options: Option<&FetchOptions>,
    ) -> Result<ScrapingResult, AppError> {
        let body = ExtractRequest {
            url,
            selectors,
            options,
        };
        self.post("extract", &body).await
    }

    async fn scrape_page(&self, request: &PageRequest<'_>) -> Result<PageSnapshot, AppError> {
        self.post("scrape", request).await
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trawl_core::error::AppError;
use trawl_core::job::{ExtractOptions, Job, ScrapeOptions};
use trawl_core::models::{
    AiOptions, AnalysisResult, FetchOptions, ResultMetadata, ScrapeTarget, ScrapingResult,
    SelectorConfig,
};

// ---------------------------------------------------------------------------
// Batch scrape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ScrapeRequest {
    /// Targets to scrape; results come back in the same order
    #[schema(value_type = Vec<Object>)]
    pub targets: Vec<ScrapeTarget>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadataResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

impl From<ResultMetadata> for ResultMetadataResponse {
    fn from(m: ResultMetadata) -> Self {
        Self {
            status_code: m.status_code,
            content_type: m.content_type,
            response_time_ms: m.response_time_ms,
            page_title: m.page_title,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingResultResponse {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadataResponse>,
}

impl From<ScrapingResult> for ScrapingResultResponse {
    fn from(r: ScrapingResult) -> Self {
        Self {
            url: r.url,
            timestamp: r.timestamp,
            data: r.data,
            success: r.success,
            error: r.error,
            metadata: r.metadata.map(ResultMetadataResponse::from),
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    /// Page to scrape (http or https)
    pub url: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub selectors: Vec<SelectorConfig>,
    /// Fetch hints forwarded to the extraction worker
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub options: Option<FetchOptions>,
    /// Result buckets to fill (text, images, videos, tables, lists on by default)
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub extract: Option<ExtractOptions>,
    /// AI analysis settings; analysis runs only when `enabled` is true
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub ai_options: Option<AiOptions>,
    /// Per-job deadline in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl From<StartJobRequest> for ScrapeOptions {
    fn from(req: StartJobRequest) -> Self {
        Self {
            url: req.url,
            selectors: req.selectors,
            options: req.options,
            extract: req.extract.unwrap_or_default(),
            ai_options: req.ai_options.unwrap_or_default(),
            timeout_secs: req.timeout_secs,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    pub url: String,
    /// `in-progress`, `completed` or `failed`
    pub status: String,
    pub progress: u8,
    /// Buckets: text, images, videos, tables, lists, links, structuredData
    pub data: serde_json::Value,
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<Job> for JobResponse {
    type Error = AppError;

    fn try_from(job: Job) -> Result<Self, Self::Error> {
        Ok(Self {
            id: job.id,
            url: job.url,
            status: job.status.to_string(),
            progress: job.progress,
            data: serde_json::to_value(job.data)?,
            metadata: serde_json::to_value(job.metadata)?,
            ai_analysis: job.ai_analysis.map(serde_json::to_value).transpose()?,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        })
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListJobsQuery {
    /// Filter by status: `in-progress`, `completed` or `failed`
    pub status: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Which analyses to run on a completed job. Every analysis is on by default.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default = "default_true")]
    pub sentiment: bool,
    #[serde(default = "default_true")]
    pub entities: bool,
    #[serde(default = "default_true")]
    pub summary: bool,
    #[serde(default = "default_true")]
    pub keywords: bool,
    #[serde(default)]
    pub model: Option<String>,
}

impl From<AnalyzeRequest> for AiOptions {
    fn from(req: AnalyzeRequest) -> Self {
        Self {
            enabled: true,
            sentiment: req.sentiment,
            entities: req.entities,
            summary: req.summary,
            keywords: req.keywords,
            model: req.model,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SentimentResponse {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EntityResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentResponse>,
    pub entities: Vec<EntityResponse>,
    pub keywords: Vec<String>,
    /// Further fields returned by the analysis worker
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<AnalysisResult> for AnalysisResponse {
    fn from(a: AnalysisResult) -> Self {
        Self {
            summary: a.summary,
            sentiment: a.sentiment.map(|s| SentimentResponse {
                label: s.label,
                score: s.score,
            }),
            entities: a
                .entities
                .into_iter()
                .map(|e| EntityResponse {
                    name: e.name,
                    kind: e.kind,
                })
                .collect(),
            keywords: a.keywords,
            extra: a.extra,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Jobs currently held in the registry
    pub jobs: usize,
    /// Jobs whose pipeline is still running
    pub running_jobs: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

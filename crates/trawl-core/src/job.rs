use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AiOptions, AnalysisResult, FetchOptions, SelectorConfig};

/// Status of a scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-progress" | "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Pipeline waypoints. Each one pins the job's progress to a fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Submitted,
    Scraped,
    AnalysisStarted,
    AnalysisDone,
    Completed,
}

impl Stage {
    pub fn progress(&self) -> u8 {
        match self {
            Stage::Submitted => 10,
            Stage::Scraped => 50,
            Stage::AnalysisStarted => 60,
            Stage::AnalysisDone => 90,
            Stage::Completed => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Submitted => "submitted",
            Stage::Scraped => "scraped",
            Stage::AnalysisStarted => "analysis-started",
            Stage::AnalysisDone => "analysis-done",
            Stage::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default)]
    pub text: String,
}

/// Result buckets filled in by the primary scrape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobData {
    pub text: Vec<String>,
    pub images: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
    pub tables: Vec<Table>,
    pub lists: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Vec<serde_json::Value>>,
}

/// Page-level descriptors, filled as they become available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

/// Tracked state of one asynchronous single-URL scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub status: JobStatus,
    pub progress: u8,
    pub data: JobData,
    pub metadata: JobMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly submitted job: in progress at the `Submitted` waypoint.
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            status: JobStatus::InProgress,
            progress: Stage::Submitted.progress(),
            data: JobData::default(),
            metadata: JobMetadata::default(),
            ai_analysis: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn advance(&mut self, stage: Stage) {
        self.progress = stage.progress();
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = Stage::Completed.progress();
        self.completed_at = Some(Utc::now());
    }

    /// Marks the job failed. Progress drops to 0 to signal "not usable".
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.progress = 0;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Text handed to the analysis stage: every text block joined by blank lines.
    pub fn analysis_text(&self) -> String {
        self.data.text.join("\n\n")
    }
}

/// Which result buckets the extraction worker should fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractOptions {
    pub text: bool,
    pub images: bool,
    pub videos: bool,
    pub tables: bool,
    pub lists: bool,
    pub links: bool,
    pub structured_data: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            text: true,
            images: true,
            videos: true,
            tables: true,
            lists: true,
            links: false,
            structured_data: false,
        }
    }
}

/// Request to start an asynchronous scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    pub url: String,
    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FetchOptions>,
    #[serde(default)]
    pub extract: ExtractOptions,
    #[serde(default)]
    pub ai_options: AiOptions,
    /// Per-job deadline; overrides the controller default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ScrapeOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selectors: Vec::new(),
            options: None,
            extract: ExtractOptions::default(),
            ai_options: AiOptions::default(),
            timeout_secs: None,
        }
    }

    pub fn with_ai(mut self, ai_options: AiOptions) -> Self {
        self.ai_options = ai_options;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn page_request(&self) -> PageRequest<'_> {
        PageRequest {
            url: &self.url,
            selectors: &self.selectors,
            options: self.options.as_ref(),
            extract: &self.extract,
        }
    }
}

/// Body of the extraction worker's page-scrape call.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest<'a> {
    pub url: &'a str,
    pub selectors: &'a [SelectorConfig],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a FetchOptions>,
    pub extract: &'a ExtractOptions,
}

/// What the extraction worker returns for a page scrape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub data: JobData,
    pub metadata: JobMetadata,
}

/// Body of the analysis worker call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub job_id: Uuid,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    pub options: AiOptions,
}

impl AnalysisRequest {
    pub fn from_job(job: &Job, options: &AiOptions) -> Self {
        Self {
            job_id: job.id,
            url: job.url.clone(),
            title: job.metadata.title.clone(),
            text: job.analysis_text(),
            options: options.clone(),
        }
    }
}

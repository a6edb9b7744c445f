use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of value a selector extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    Text,
    Html,
    Attribute,
    List,
}

/// One extraction instruction, passed through to the extraction worker untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    pub id: String,
    pub selector: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SelectorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_item_selector: Option<String>,
}

/// Fetch hints forwarded to the extraction worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<String>,
    pub render_javascript: bool,
}

/// A URL plus its extraction instructions, as submitted to the batch API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeTarget {
    pub url: String,
    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FetchOptions>,
}

impl ScrapeTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selectors: Vec::new(),
            options: None,
        }
    }

    pub fn with_selector(mut self, selector: SelectorConfig) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Page-level response descriptors reported by the extraction worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

/// Final outcome of scraping one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingResult {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl ScrapingResult {
    pub fn success(
        url: impl Into<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            data,
            success: true,
            error: None,
            metadata: None,
        }
    }

    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            data: serde_json::Map::new(),
            success: false,
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

fn default_true() -> bool {
    true
}

/// Which AI analyses to run for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub sentiment: bool,
    #[serde(default = "default_true")]
    pub entities: bool,
    #[serde(default = "default_true")]
    pub summary: bool,
    #[serde(default = "default_true")]
    pub keywords: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for AiOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            sentiment: true,
            entities: true,
            summary: true,
            keywords: true,
            model: None,
        }
    }
}

impl AiOptions {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Output of the analysis worker. Fields the worker adds beyond the known
/// ones are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

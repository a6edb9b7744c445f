//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls. No lock is held across an await.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::job::{AnalysisRequest, JobData, JobMetadata, PageRequest, PageSnapshot};
use crate::models::{AnalysisResult, FetchOptions, ScrapingResult, SelectorConfig};
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::traits::{Analyzer, ScrapeWorker};

// ---------------------------------------------------------------------------
// MockWorker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WorkerState {
    /// Per-URL queue of extract outcomes. Once drained, calls succeed.
    scripts: HashMap<String, VecDeque<Result<ScrapingResult, AppError>>>,
    /// URLs whose extract calls always return `success: false`.
    failing: HashMap<String, String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    /// Queue of page-scrape outcomes. Once drained, an empty page is returned.
    pages: VecDeque<Result<PageSnapshot, AppError>>,
    calls: Vec<String>,
}

/// Mock extraction worker with scripted per-URL behavior.
///
/// Tracks how many calls are in flight so tests can assert concurrency bounds.
#[derive(Clone, Default)]
pub struct MockWorker {
    state: Arc<Mutex<WorkerState>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, url: &str, outcomes: Vec<Result<ScrapingResult, AppError>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(url.to_string(), outcomes.into());
        self
    }

    pub fn failing(self, url: &str, error: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(url.to_string(), error.to_string());
        self
    }

    pub fn panicking(self, url: &str) -> Self {
        self.state.lock().unwrap().panicking.insert(url.to_string());
        self
    }

    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(url.to_string(), delay);
        self
    }

    pub fn with_default_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().default_delay = Some(delay);
        self
    }

    pub fn with_page(self, page: Result<PageSnapshot, AppError>) -> Self {
        self.state.lock().unwrap().pages.push_back(page);
        self
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Records the call and returns the delay to apply.
    fn enter(&self, url: &str) -> Option<Duration> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        state.calls.push(url.to_string());
        state.delays.get(url).copied().or(state.default_delay)
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScrapeWorker for MockWorker {
    async fn extract(
        &self,
        url: &str,
        _selectors: &[SelectorConfig],
        _options: Option<&FetchOptions>,
    ) -> Result<ScrapingResult, AppError> {
        let delay = self.enter(url);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut state = self.state.lock().unwrap();
            if state.panicking.contains(url) {
                None
            } else if let Some(error) = state.failing.get(url) {
                Some(Ok(ScrapingResult::failure(url, error.clone())))
            } else {
                let scripted = state.scripts.get_mut(url).and_then(VecDeque::pop_front);
                Some(scripted.unwrap_or_else(|| {
                    let mut data = serde_json::Map::new();
                    data.insert("url".into(), serde_json::Value::String(url.to_string()));
                    Ok(ScrapingResult::success(url, data))
                }))
            }
        };

        self.leave();
        match outcome {
            Some(outcome) => outcome,
            None => panic!("mock worker panic for {url}"),
        }
    }

    async fn scrape_page(&self, request: &PageRequest<'_>) -> Result<PageSnapshot, AppError> {
        let delay = self.enter(request.url);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (page, panicking) = {
            let mut state = self.state.lock().unwrap();
            (state.pages.pop_front(), state.panicking.contains(request.url))
        };
        self.leave();
        if panicking {
            panic!("mock worker page panic for {}", request.url);
        }
        page.unwrap_or_else(|| Ok(PageSnapshot::default()))
    }
}

/// A page snapshot with a title and the given text blocks.
pub fn make_test_snapshot(title: &str, text: &[&str]) -> PageSnapshot {
    PageSnapshot {
        data: JobData {
            text: text.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        },
        metadata: JobMetadata {
            title: Some(title.to_string()),
            status_code: Some(200),
            ..Default::default()
        },
    }
}

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

/// Mock analysis worker. Each call pops the next queued response; once the
/// queue is empty it returns an empty analysis.
#[derive(Clone, Default)]
pub struct MockAnalyzer {
    responses: Arc<Mutex<VecDeque<Result<AnalysisResult, AppError>>>>,
    requests: Arc<Mutex<Vec<AnalysisRequest>>>,
    delay: Option<Duration>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: Result<AnalysisResult, AppError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Analyzer for MockAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.responses.lock().unwrap().pop_front();
        response.unwrap_or_else(|| Ok(AnalysisResult::default()))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records pipeline events as short labels plus the progress they carry.
#[derive(Default)]
pub struct MockReporter {
    events: Mutex<Vec<(String, Option<u8>)>>,
}

impl MockReporter {
    pub fn labels(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// Progress values in the order they were reported.
    pub fn progress(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, progress)| *progress)
            .collect()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let entry = match event {
            PipelineEvent::JobStarted { .. } => ("started".to_string(), None),
            PipelineEvent::StageEntered {
                stage, progress, ..
            } => (stage.as_str().to_string(), Some(progress)),
            PipelineEvent::JobCompleted { .. } => ("completed".to_string(), Some(100)),
            PipelineEvent::JobFailed { .. } => ("failed".to_string(), None),
            PipelineEvent::JobCancelled { .. } => ("cancelled".to_string(), None),
        };
        self.events.lock().unwrap().push(entry);
    }
}

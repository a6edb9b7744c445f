//! Per-job pipeline: primary scrape, optional AI analysis, terminal state.
//!
//! `start` registers the job and returns its id right away; the stages run
//! on a background task and are observed by polling the registry.

use std::collections::HashMap;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{AnalysisRequest, Job, JobStatus, ScrapeOptions, Stage};
use crate::models::{AiOptions, AnalysisResult};
use crate::registry::JobRegistry;
use crate::traits::{Analyzer, ScrapeWorker};

/// Events emitted while a job moves through the pipeline.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    JobStarted { job_id: Uuid, url: &'a str },
    StageEntered { job_id: Uuid, stage: Stage, progress: u8 },
    JobCompleted { job_id: Uuid },
    JobFailed { job_id: Uuid, error: &'a str },
    JobCancelled { job_id: Uuid },
}

/// Receives pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::JobStarted { job_id, url } => {
                tracing::info!(%job_id, %url, "Job started");
            }
            PipelineEvent::StageEntered {
                job_id,
                stage,
                progress,
            } => {
                tracing::debug!(%job_id, %stage, progress, "Job stage reached");
            }
            PipelineEvent::JobCompleted { job_id } => {
                tracing::info!(%job_id, "Job completed");
            }
            PipelineEvent::JobFailed { job_id, error } => {
                tracing::warn!(%job_id, %error, "Job failed");
            }
            PipelineEvent::JobCancelled { job_id } => {
                tracing::info!(%job_id, "Job cancelled");
            }
        }
    }
}

/// How background job tasks are admitted.
#[derive(Debug, Clone, Default)]
pub enum Admission {
    /// Every job starts immediately.
    #[default]
    Unbounded,
    /// At most `n` jobs run at once; the rest wait for a permit.
    Bounded(Arc<Semaphore>),
}

impl Admission {
    pub fn bounded(limit: usize) -> Self {
        Admission::Bounded(Arc::new(Semaphore::new(limit.max(1))))
    }

    pub fn from_limit(limit: Option<usize>) -> Self {
        limit.map_or(Admission::Unbounded, Admission::bounded)
    }

    fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Admission::Unbounded => tokio::spawn(task),
            Admission::Bounded(semaphore) => {
                let semaphore = Arc::clone(semaphore);
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        tracing::error!("Job admission semaphore closed");
                        return;
                    };
                    task.await;
                })
            }
        }
    }
}

/// Drives scrape jobs through their stages against the registry.
pub struct PipelineController<W, A> {
    registry: Arc<JobRegistry>,
    worker: W,
    analyzer: A,
    admission: Admission,
    reporter: Arc<dyn PipelineReporter>,
    shutdown: CancellationToken,
    running: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    job_timeout: Option<Duration>,
}

impl<W: Clone, A: Clone> Clone for PipelineController<W, A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            worker: self.worker.clone(),
            analyzer: self.analyzer.clone(),
            admission: self.admission.clone(),
            reporter: Arc::clone(&self.reporter),
            shutdown: self.shutdown.clone(),
            running: Arc::clone(&self.running),
            job_timeout: self.job_timeout,
        }
    }
}

impl<W: ScrapeWorker, A: Analyzer> PipelineController<W, A> {
    pub fn new(registry: Arc<JobRegistry>, worker: W, analyzer: A) -> Self {
        Self {
            registry,
            worker,
            analyzer,
            admission: Admission::Unbounded,
            reporter: Arc::new(TracingPipelineReporter),
            shutdown: CancellationToken::new(),
            running: Arc::new(Mutex::new(HashMap::new())),
            job_timeout: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn PipelineReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    /// Default deadline for jobs that do not set `timeout_secs`.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Parent token for every job; cancelling it stops all running jobs.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    fn lock_running(&self) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        lock_running(&self.running)
    }

    /// Registers a job and launches its pipeline in the background.
    ///
    /// Only a malformed URL or a shut-down controller is reported here; every
    /// later failure ends up in the job record.
    pub fn start(&self, options: ScrapeOptions) -> Result<Uuid, AppError> {
        validate_url(&options.url)?;
        if self.shutdown.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let job = Job::new(&options.url);
        let job_id = job.id;
        self.registry.create(job)?;

        let cancel = self.shutdown.child_token();
        self.lock_running().insert(job_id, cancel.clone());

        let controller = self.clone();
        self.admission
            .spawn(async move { controller.drive(job_id, options, cancel).await });

        Ok(job_id)
    }

    pub fn get_status(&self, job_id: Uuid) -> Option<Job> {
        self.registry.get(job_id)
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.registry.list()
    }

    /// Removes a job, cancelling its pipeline if it is still running.
    pub fn delete_job(&self, job_id: Uuid) -> bool {
        if let Some(cancel) = self.lock_running().remove(&job_id) {
            cancel.cancel();
        }
        self.registry.delete(job_id)
    }

    /// Number of jobs whose pipeline task has not finished yet.
    pub fn running_jobs(&self) -> usize {
        self.lock_running().len()
    }

    /// Cancels every running job and refuses new ones.
    pub fn shutdown(&self) {
        let running = self.running_jobs();
        tracing::info!(running, "Pipeline shutting down");
        self.shutdown.cancel();
    }

    /// Runs analysis on an already completed job and attaches the result.
    ///
    /// Unlike the in-pipeline stage, errors are returned to the caller and
    /// the job's status and progress are left alone.
    pub async fn run_ai_analysis(
        &self,
        job_id: Uuid,
        options: &AiOptions,
    ) -> Result<AnalysisResult, AppError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
        if job.status != JobStatus::Completed {
            return Err(AppError::Conflict(format!(
                "job {job_id} is {}, analysis needs a completed job",
                job.status
            )));
        }

        let request = AnalysisRequest::from_job(&job, options);
        let analysis = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(AppError::Cancelled),
            analysis = self.analyzer.analyze(&request) => analysis?,
        };

        let attached = analysis.clone();
        self.registry
            .update(job_id, |job| job.ai_analysis = Some(attached))?;
        tracing::info!(%job_id, "Standalone analysis attached");
        Ok(analysis)
    }

    async fn drive(self, job_id: Uuid, options: ScrapeOptions, cancel: CancellationToken) {
        let _running = RunningEntry {
            running: Arc::clone(&self.running),
            job_id,
        };

        self.reporter.report(PipelineEvent::JobStarted {
            job_id,
            url: &options.url,
        });

        let deadline = options
            .timeout_secs
            .map(Duration::from_secs)
            .or(self.job_timeout);

        let stages = AssertUnwindSafe(self.run_with_deadline(job_id, &options, deadline))
            .catch_unwind();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Cancelled),
            outcome = stages => outcome.unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                tracing::error!(%job_id, reason, "Pipeline task panicked");
                Err(AppError::TaskFailed(reason.to_string()))
            }),
        };

        match outcome {
            Ok(()) => match self.registry.update(job_id, Job::complete) {
                Ok(_) => self.reporter.report(PipelineEvent::JobCompleted { job_id }),
                Err(e) => record_lost(job_id, &e),
            },
            Err(e) => {
                let message = e.to_string();
                if let Err(update_err) = self.registry.update(job_id, |job| job.fail(&message)) {
                    record_lost(job_id, &update_err);
                } else if matches!(e, AppError::Cancelled) {
                    self.reporter.report(PipelineEvent::JobCancelled { job_id });
                } else {
                    self.reporter.report(PipelineEvent::JobFailed {
                        job_id,
                        error: &message,
                    });
                }
            }
        }
    }

    async fn run_with_deadline(
        &self,
        job_id: Uuid,
        options: &ScrapeOptions,
        deadline: Option<Duration>,
    ) -> Result<(), AppError> {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.run_stages(job_id, options))
                .await
                .map_err(|_| AppError::Timeout(limit.as_secs()))?,
            None => self.run_stages(job_id, options).await,
        }
    }

    async fn run_stages(&self, job_id: Uuid, options: &ScrapeOptions) -> Result<(), AppError> {
        let snapshot = self.worker.scrape_page(&options.page_request()).await?;
        self.registry.update(job_id, |job| {
            job.data = snapshot.data;
            job.metadata = snapshot.metadata;
            job.advance(Stage::Scraped);
        })?;
        self.stage_entered(job_id, Stage::Scraped);

        if !options.ai_options.enabled {
            return Ok(());
        }

        let job = self
            .registry
            .update(job_id, |job| job.advance(Stage::AnalysisStarted))?;
        self.stage_entered(job_id, Stage::AnalysisStarted);

        let request = AnalysisRequest::from_job(&job, &options.ai_options);
        let analysis = self.analyzer.analyze(&request).await?;
        self.registry.update(job_id, |job| {
            job.ai_analysis = Some(analysis);
            job.advance(Stage::AnalysisDone);
        })?;
        self.stage_entered(job_id, Stage::AnalysisDone);

        Ok(())
    }

    fn stage_entered(&self, job_id: Uuid, stage: Stage) {
        self.reporter.report(PipelineEvent::StageEntered {
            job_id,
            stage,
            progress: stage.progress(),
        });
    }
}

/// The job vanished (deleted) or refused the update while its task was running.
fn lock_running(
    running: &Mutex<HashMap<Uuid, CancellationToken>>,
) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
    running.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered from poisoned running-jobs lock");
        poisoned.into_inner()
    })
}

/// Removes a job from the running set when its pipeline task ends, however it ends.
struct RunningEntry {
    running: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    job_id: Uuid,
}

impl Drop for RunningEntry {
    fn drop(&mut self) {
        lock_running(&self.running).remove(&self.job_id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn record_lost(job_id: Uuid, error: &AppError) {
    if error.is_not_found() {
        tracing::debug!(%job_id, "Job removed while running");
    } else {
        tracing::warn!(%job_id, %error, "Could not record job outcome");
    }
}

fn validate_url(raw: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AppError::InvalidInput(format!("invalid URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        scheme => Err(AppError::InvalidInput(format!(
            "unsupported URL '{raw}' (scheme '{scheme}'), expected http or https"
        ))),
    }
}

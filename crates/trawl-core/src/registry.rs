//! In-memory store of scrape jobs.
//!
//! Readers always receive snapshots (clones). Every mutation goes through
//! [`JobRegistry::update`], which validates the transition before storing it,
//! so a stored job never regresses.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{Job, JobStatus};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
    retention: Option<TimeDelta>,
}

impl JobRegistry {
    /// A registry that keeps every job until it is deleted.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose terminal jobs become purgeable `retention` after they
    /// finish. A zero duration keeps jobs forever.
    pub fn with_retention(retention: Duration) -> Self {
        let retention = if retention.is_zero() {
            None
        } else {
            TimeDelta::from_std(retention).ok()
        };
        Self {
            jobs: RwLock::default(),
            retention,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned job registry lock");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned job registry lock");
            poisoned.into_inner()
        })
    }

    /// Inserts a new job. Fails with `Conflict` if the id is already taken.
    pub fn create(&self, job: Job) -> Result<(), AppError> {
        let mut jobs = self.write();
        if jobs.contains_key(&job.id) {
            return Err(AppError::Conflict(format!("job {} already exists", job.id)));
        }
        tracing::debug!(job_id = %job.id, url = %job.url, "Job registered");
        jobs.insert(job.id, job);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.read().get(&id).cloned()
    }

    /// Applies `mutate` to a copy of the job, validates the result against the
    /// stored version and stores it. Returns the new snapshot.
    ///
    /// The stored job is left untouched when validation fails.
    pub fn update<F>(&self, id: Uuid, mutate: F) -> Result<Job, AppError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.write();
        let current = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id}")))?;

        let mut next = current.clone();
        mutate(&mut next);
        validate_transition(current, &next)?;
        next.updated_at = Utc::now();

        *current = next.clone();
        Ok(next)
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub fn delete(&self, id: Uuid) -> bool {
        self.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes terminal jobs whose retention window has elapsed. Returns how
    /// many were removed.
    pub fn purge_expired(&self) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let now = Utc::now();

        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| match job.completed_at {
            Some(done) if job.status.is_terminal() => done + retention > now,
            _ => true,
        });
        before - jobs.len()
    }

    /// Periodically purges expired jobs until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = registry.purge_expired();
                        if purged > 0 {
                            tracing::info!(purged, remaining = registry.len(), "Purged expired jobs");
                        }
                    }
                }
            }
            tracing::debug!("Job sweeper stopped");
        })
    }
}

fn validate_transition(current: &Job, next: &Job) -> Result<(), AppError> {
    if next.id != current.id {
        return Err(AppError::InvalidTransition(format!(
            "job {} cannot change its id",
            current.id
        )));
    }
    if next.progress > 100 {
        return Err(AppError::InvalidTransition(format!(
            "job {}: progress {} is above 100",
            current.id, next.progress
        )));
    }

    if current.status.is_terminal() {
        if next.status != current.status || next.progress != current.progress {
            return Err(AppError::InvalidTransition(format!(
                "job {} is already {}",
                current.id, current.status
            )));
        }
        return Ok(());
    }

    // In progress: forward moves only, unless the job is failing.
    if next.status != JobStatus::Failed && next.progress < current.progress {
        return Err(AppError::InvalidTransition(format!(
            "job {}: progress cannot go from {} to {}",
            current.id, current.progress, next.progress
        )));
    }
    Ok(())
}

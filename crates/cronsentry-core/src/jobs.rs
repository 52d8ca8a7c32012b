//! Job lifecycle operations with validation and ownership checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};

use cronsentry_protocols::{Job, JobEvent, JobStatus, JobStore, Notification, NotificationQueue};

use crate::clock::Clock;
use crate::error::MonitorError;
use crate::schedule::{next_expect, parse_timezone, validate_grace, CronSchedule};

/// Fields accepted when creating a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub schedule: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, alias = "grace_time")]
    pub grace_minutes: i64,
}

/// Partial update; absent fields are left untouched. An empty string clears
/// `description` and `timezone`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, alias = "grace_time")]
    pub grace_minutes: Option<i64>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// CRUD plus pause/resume for jobs.
pub struct JobService {
    store: Arc<dyn JobStore>,
    notifications: Arc<dyn NotificationQueue>,
    clock: Arc<dyn Clock>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        notifications: Arc<dyn NotificationQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifications,
            clock,
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, owner_id: &str, request: NewJob) -> Result<Job, MonitorError> {
        let name = required_name(&request.name)?;
        let timezone = non_empty(request.timezone);
        let grace = validate_grace(request.grace_minutes)?;
        let schedule = CronSchedule::parse(&request.schedule, timezone.as_deref())?;

        let now = self.clock.now();
        let expect = schedule.next_fire_after(now)? + chrono::Duration::minutes(i64::from(grace));

        let mut job = Job::new(owner_id, name, schedule.expression(), grace, expect, now);
        job.description = non_empty(request.description);
        job.timezone = timezone;

        self.store.create(&job).await?;
        info!(job_id = %job.id, next_expect = %job.next_expect, "Job created");
        Ok(job)
    }

    /// Load a job, failing with `Forbidden` when another owner holds it.
    pub async fn get(&self, owner_id: &str, id: &str) -> Result<Job, MonitorError> {
        let job = self.store.get(id).await?;
        if job.owner_id != owner_id {
            return Err(MonitorError::Forbidden(id.to_string()));
        }
        Ok(job)
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<Job>, MonitorError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, owner_id: &str, id: &str, patch: JobPatch) -> Result<Job, MonitorError> {
        let mut job = self.get(owner_id, id).await?;
        let now = self.clock.now();
        let mut recompute = false;

        if let Some(name) = patch.name {
            job.name = required_name(&name)?.to_string();
        }
        if let Some(description) = patch.description {
            job.description = non_empty(Some(description));
        }
        if let Some(schedule) = patch.schedule {
            job.schedule = schedule.trim().to_string();
            recompute = true;
        }
        if let Some(timezone) = patch.timezone {
            job.timezone = non_empty(Some(timezone));
            recompute = true;
        }
        if let Some(grace) = patch.grace_minutes {
            job.grace_minutes = validate_grace(grace)?;
            recompute = true;
        }
        match patch.status {
            None => {}
            Some(JobStatus::Missing) => {
                return Err(MonitorError::Validation(
                    "status can only be set to healthy or paused".to_string(),
                ));
            }
            Some(JobStatus::Paused) => job.status = JobStatus::Paused,
            Some(JobStatus::Healthy) => {
                if job.status != JobStatus::Healthy {
                    job.status = JobStatus::Healthy;
                    recompute = true;
                }
            }
        }

        parse_timezone(job.timezone.as_deref())?;
        if recompute {
            job.next_expect = self.expect_from(&job, now)?;
        }

        let saved = self.store.update(&job, now).await?;
        info!(job_id = %saved.id, status = %saved.status, "Job updated");
        Ok(saved)
    }

    /// Exclude a job from sweeps. Pausing a paused job is a no-op.
    #[instrument(skip(self))]
    pub async fn pause(&self, owner_id: &str, id: &str) -> Result<Job, MonitorError> {
        let mut job = self.get(owner_id, id).await?;
        if job.is_paused() {
            return Ok(job);
        }
        job.status = JobStatus::Paused;
        let saved = self.store.update(&job, self.clock.now()).await?;
        info!(job_id = %saved.id, "Job paused");
        Ok(saved)
    }

    /// Return a paused job to Healthy with `next_expect` counted from now.
    #[instrument(skip(self))]
    pub async fn resume(&self, owner_id: &str, id: &str) -> Result<Job, MonitorError> {
        let mut job = self.get(owner_id, id).await?;
        if !job.is_paused() {
            return Ok(job);
        }
        let now = self.clock.now();
        job.status = JobStatus::Healthy;
        job.next_expect = self.expect_from(&job, now)?;
        let saved = self.store.update(&job, now).await?;
        info!(job_id = %saved.id, next_expect = %saved.next_expect, "Job resumed");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<(), MonitorError> {
        self.get(owner_id, id).await?;
        self.store.delete(id, owner_id).await?;
        info!(job_id = %id, "Job deleted");
        Ok(())
    }

    pub async fn events(
        &self,
        owner_id: &str,
        id: &str,
        limit: usize,
    ) -> Result<Vec<JobEvent>, MonitorError> {
        self.get(owner_id, id).await?;
        Ok(self.store.list_events(id, limit).await?)
    }

    pub async fn notifications(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Vec<Notification>, MonitorError> {
        self.get(owner_id, id).await?;
        Ok(self.notifications.list_notifications(id).await?)
    }

    fn expect_from(&self, job: &Job, reference: DateTime<Utc>) -> Result<DateTime<Utc>, MonitorError> {
        Ok(next_expect(
            &job.schedule,
            job.timezone.as_deref(),
            job.grace_minutes,
            reference,
        )?)
    }
}

fn required_name(name: &str) -> Result<&str, MonitorError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MonitorError::Validation("name is required".to_string()));
    }
    Ok(name)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;

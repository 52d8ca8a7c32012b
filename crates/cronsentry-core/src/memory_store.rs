//! In-process job store.
//!
//! All tables sit behind one mutex, so every trait method is a single atomic
//! unit. Backs the engine and API tests; the service itself always runs on
//! SQLite, including `database.path = ":memory:"`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use cronsentry_protocols::{
    failure_payload, Job, JobEvent, JobStatus, JobStore, NextExpectPolicy, Notification,
    NotificationQueue, NotificationStatus, PendingDelivery, PingOutcome, StoreError, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    jobs: HashMap<String, Job>,
    events: Vec<JobEvent>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn pending_notification_mut(&mut self, id: &str) -> Result<&mut Notification, StoreError> {
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !notification.is_pending() {
            return Err(StoreError::Conflict(format!(
                "notification {} is already {}",
                id, notification.status
            )));
        }
        Ok(notification)
    }
}

/// Job store kept entirely in memory.
#[derive(Default)]
pub struct MemoryJobStore {
    tables: Mutex<Tables>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications, across all jobs.
    pub fn notification_count(&self) -> usize {
        self.tables.lock().notifications.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                existing.email = user.email.clone();
                existing.name = user.name.clone();
            }
            None => {
                tables.users.insert(user.id.clone(), user.clone());
            }
        }
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.tables
            .lock()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if tables.jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        tables.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.tables
            .lock()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.lock();
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn update(&self, job: &Job, now: DateTime<Utc>) -> Result<Job, StoreError> {
        let mut tables = self.tables.lock();
        let stored = tables
            .jobs
            .get_mut(&job.id)
            .filter(|stored| stored.owner_id == job.owner_id)
            .ok_or_else(|| StoreError::NotFoundOrNotOwned(job.id.clone()))?;
        if stored.updated_at != job.updated_at {
            return Err(StoreError::Conflict(format!(
                "job {} changed since it was read",
                job.id
            )));
        }

        stored.name = job.name.clone();
        stored.description = job.description.clone();
        stored.schedule = job.schedule.clone();
        stored.timezone = job.timezone.clone();
        stored.grace_minutes = job.grace_minutes;
        stored.next_expect = job.next_expect;
        stored.status = job.status;
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let owned = tables.jobs.get(id).is_some_and(|job| job.owner_id == owner_id);
        if !owned {
            return Err(StoreError::NotFoundOrNotOwned(id.to_string()));
        }
        tables.jobs.remove(id);
        tables.events.retain(|e| e.job_id != id);
        tables.notifications.retain(|n| n.job_id != id);
        Ok(())
    }

    async fn record_ping_and_maybe_recover(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
        policy: Arc<dyn NextExpectPolicy>,
    ) -> Result<PingOutcome, StoreError> {
        let mut tables = self.tables.lock();
        let job = tables
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        let next_expect = policy.next_expect(job, now).map_err(StoreError::Schedule)?;
        let prior_status = job.status;
        let recovered = prior_status == JobStatus::Missing;

        job.last_ping = Some(now);
        job.next_expect = next_expect;
        if recovered {
            job.status = JobStatus::Healthy;
        }
        job.updated_at = now;

        let outcome = PingOutcome {
            job_id: job.id.clone(),
            prior_status,
            status: job.status,
            last_ping: now,
            next_expect,
        };
        tables
            .events
            .push(JobEvent::checked_in(job_id, recovered, next_expect, now));
        Ok(outcome)
    }

    async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.lock();
        let mut overdue: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| job.status != JobStatus::Paused && job.next_expect <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|job| job.next_expect);
        Ok(overdue)
    }

    async fn mark_missing_if_still_healthy_or_late(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let Some(job) = tables.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Healthy || job.next_expect > now {
            return Ok(false);
        }

        job.status = JobStatus::Missing;
        job.updated_at = now;
        let event = JobEvent::missed(job_id, job.next_expect, now);
        let notification = Notification::missed_run(job, now);

        tables.events.push(event);
        tables.notifications.push(notification);
        Ok(true)
    }

    async fn list_events(&self, job_id: &str, limit: usize) -> Result<Vec<JobEvent>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|e| e.job_id == job_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationQueue for MemoryJobStore {
    async fn fetch_pending_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PendingDelivery>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.is_pending() && n.next_attempt_at.is_none_or(|at| at <= now))
            .take(limit)
            .map(|n| PendingDelivery {
                notification: n.clone(),
                job_name: tables
                    .jobs
                    .get(&n.job_id)
                    .map(|job| job.name.clone())
                    .unwrap_or_default(),
                recipient: tables.users.get(&n.user_id).map(|user| user.email.clone()),
            })
            .collect())
    }

    async fn mark_notification_sent(
        &self,
        id: &str,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let notification = tables.pending_notification_mut(id)?;
        notification.status = NotificationStatus::Sent;
        notification.attempts = attempts;
        notification.next_attempt_at = None;
        notification.sent_at = Some(now);
        if let Some(data) = notification.data.as_object_mut() {
            data.remove("error");
        }
        Ok(())
    }

    async fn mark_notification_failed(
        &self,
        id: &str,
        reason: &str,
        attempts: u32,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let notification = tables.pending_notification_mut(id)?;
        notification.status = NotificationStatus::Failed;
        notification.attempts = attempts;
        notification.next_attempt_at = None;
        notification.data = failure_payload(reason);
        Ok(())
    }

    async fn schedule_notification_retry(
        &self,
        id: &str,
        reason: &str,
        attempts: u32,
        retry_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let notification = tables.pending_notification_mut(id)?;
        notification.attempts = attempts;
        notification.next_attempt_at = Some(retry_at);
        notification.data = failure_payload(reason);
        Ok(())
    }

    async fn get_notification(&self, id: &str) -> Result<Notification, StoreError> {
        self.tables
            .lock()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_notifications(&self, job_id: &str) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;

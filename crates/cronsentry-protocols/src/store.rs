//! Job store protocol definitions.
//!
//! Stores own every persisted record. Each status transition is a single
//! atomic unit so the detector, the dispatcher and concurrent pings only
//! coordinate through the store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{Job, JobEvent, Notification, PendingDelivery, PingOutcome, User};

/// Computes a job's next expected check-in while a ping is being recorded.
///
/// Called by the store with the row as read inside the ping transaction,
/// before any field is changed.
pub trait NextExpectPolicy: Send + Sync {
    fn next_expect(&self, job: &Job, now: DateTime<Utc>) -> Result<DateTime<Utc>, String>;
}

/// Persisted jobs, their history and their status transitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Returns the store ID.
    fn id(&self) -> &str;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: &str) -> Result<User, StoreError>;

    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Job, StoreError>;

    /// Jobs of one owner, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError>;

    /// Overwrite the editable fields of a job.
    ///
    /// `job.updated_at` must be the value that was read; if the row changed
    /// since then the update fails with [`StoreError::Conflict`]. Fails with
    /// [`StoreError::NotFoundOrNotOwned`] when no row matches id and owner.
    async fn update(&self, job: &Job, now: DateTime<Utc>) -> Result<Job, StoreError>;

    /// Delete a job together with its events and notifications.
    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError>;

    /// Record a ping as one atomic unit: set `last_ping`, recompute
    /// `next_expect` through `policy`, move Missing to Healthy and append a
    /// Recovery event (or a Ping event when no transition happened).
    async fn record_ping_and_maybe_recover(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
        policy: Arc<dyn NextExpectPolicy>,
    ) -> Result<PingOutcome, StoreError>;

    /// Non-paused jobs whose `next_expect` is at or before `now`.
    async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError>;

    /// Move a job from Healthy to Missing if it is still Healthy and still
    /// late at `now`, inserting the Miss event and one pending notification
    /// in the same unit. Returns false when nothing changed.
    async fn mark_missing_if_still_healthy_or_late(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Most recent events of a job, newest first.
    async fn list_events(&self, job_id: &str, limit: usize) -> Result<Vec<JobEvent>, StoreError>;
}

/// Pending notification bookkeeping consumed by the dispatcher.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Oldest pending notifications that are due at `now`.
    async fn fetch_pending_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PendingDelivery>, StoreError>;

    async fn mark_notification_sent(
        &self,
        id: &str,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Terminal failure; `reason` is stored under `error` in the payload.
    async fn mark_notification_failed(
        &self,
        id: &str,
        reason: &str,
        attempts: u32,
    ) -> Result<(), StoreError>;

    /// Keep the notification pending but hold it back until `retry_at`.
    async fn schedule_notification_retry(
        &self,
        id: &str,
        reason: &str,
        attempts: u32,
        retry_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn get_notification(&self, id: &str) -> Result<Notification, StoreError>;

    /// Notifications raised for a job, newest first.
    async fn list_notifications(&self, job_id: &str) -> Result<Vec<Notification>, StoreError>;
}

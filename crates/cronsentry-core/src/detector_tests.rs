use super::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cronsentry_protocols::{
    EventKind, Job, JobEvent, JobStatus, NextExpectPolicy, PingOutcome, StoreError, User,
};

use crate::clock::ManualClock;
use crate::memory_store::MemoryJobStore;
use crate::schedule::{next_expect, ScheduleRecompute};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap()
}

fn five_minute_job() -> Job {
    let expect = next_expect("*/5 * * * *", None, 2, t0()).unwrap();
    Job::new("owner", "backup", "*/5 * * * *", 2, expect, t0())
}

async fn setup() -> (MissedRunDetector, Arc<MemoryJobStore>, Arc<ManualClock>, Job) {
    let store = Arc::new(MemoryJobStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let job = five_minute_job();
    store.create(&job).await.unwrap();
    (
        MissedRunDetector::new(store.clone(), clock.clone()),
        store,
        clock,
        job,
    )
}

#[tokio::test]
async fn test_sweep_before_deadline_does_nothing() {
    let (detector, store, clock, _) = setup().await;
    clock.advance(Duration::minutes(6));

    let report = detector.sweep().await.unwrap();
    assert_eq!(report, SweepReport::default());
    assert_eq!(store.notification_count(), 0);
}

#[tokio::test]
async fn test_sweep_at_deadline_marks_missing() {
    let (detector, store, clock, job) = setup().await;
    clock.advance(Duration::minutes(7));

    let report = detector.sweep().await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.transitioned, 1);

    let stored = store.get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Missing);

    let events = store.list_events(&job.id, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Miss);
    assert_eq!(store.notification_count(), 1);
}

#[tokio::test]
async fn test_back_to_back_sweeps_notify_once() {
    let (detector, store, clock, _) = setup().await;
    clock.advance(Duration::minutes(8));

    assert_eq!(detector.sweep().await.unwrap().transitioned, 1);
    let second = detector.sweep().await.unwrap();
    assert_eq!(second.transitioned, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(store.notification_count(), 1);
}

#[tokio::test]
async fn test_paused_jobs_are_never_swept() {
    let (detector, store, clock, job) = setup().await;
    let mut paused = job.clone();
    paused.status = JobStatus::Paused;
    store.update(&paused, t0()).await.unwrap();

    clock.advance(Duration::days(3));
    let report = detector.sweep().await.unwrap();
    assert_eq!(report.candidates, 0);
    assert_eq!(store.get(&job.id).await.unwrap().status, JobStatus::Paused);
    assert_eq!(store.notification_count(), 0);
}

#[tokio::test]
async fn test_ping_between_scan_and_mark_wins() {
    let (detector, store, clock, job) = setup().await;
    clock.advance(Duration::minutes(7));
    let now = clock.now();

    let candidates = store.sweep_overdue(now).await.unwrap();
    assert_eq!(candidates.len(), 1);
    store
        .record_ping_and_maybe_recover(&job.id, now, Arc::new(ScheduleRecompute::default()))
        .await
        .unwrap();

    let report = detector.sweep().await.unwrap();
    assert_eq!(report.candidates, 0);
    assert_eq!(store.get(&job.id).await.unwrap().status, JobStatus::Healthy);
}

/// Store whose scan works but whose conditional update always fails.
struct FlakyStore {
    inner: MemoryJobStore,
}

#[async_trait]
impl JobStore for FlakyStore {
    fn id(&self) -> &str {
        "flaky"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.upsert_user(user).await
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.inner.get_user(id).await
    }

    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.create(job).await
    }

    async fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.inner.get(id).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn update(&self, job: &Job, now: DateTime<Utc>) -> Result<Job, StoreError> {
        self.inner.update(job, now).await
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        self.inner.delete(id, owner_id).await
    }

    async fn record_ping_and_maybe_recover(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
        policy: Arc<dyn NextExpectPolicy>,
    ) -> Result<PingOutcome, StoreError> {
        self.inner.record_ping_and_maybe_recover(job_id, now, policy).await
    }

    async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        self.inner.sweep_overdue(now).await
    }

    async fn mark_missing_if_still_healthy_or_late(
        &self,
        _job_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Storage("database is locked".to_string()))
    }

    async fn list_events(&self, job_id: &str, limit: usize) -> Result<Vec<JobEvent>, StoreError> {
        self.inner.list_events(job_id, limit).await
    }
}

#[tokio::test]
async fn test_per_job_failures_do_not_abort_sweep() {
    let store = Arc::new(FlakyStore {
        inner: MemoryJobStore::new(),
    });
    store.create(&five_minute_job()).await.unwrap();
    store.create(&five_minute_job()).await.unwrap();
    let clock = Arc::new(ManualClock::new(t0() + Duration::minutes(7)));

    let detector = MissedRunDetector::new(store, clock);
    let report = detector.sweep().await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.transitioned, 0);
}

#[tokio::test]
async fn test_periodic_task_name() {
    let (detector, _, _, _) = setup().await;
    assert_eq!(detector.name(), "missed-run-detector");
    assert_eq!(detector.run_once().await.unwrap(), SweepReport::default());
}

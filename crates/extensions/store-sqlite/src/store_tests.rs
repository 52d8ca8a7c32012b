use super::*;
use chrono::{Duration as ChronoDuration, TimeZone};
use cronsentry_core::{next_expect, RecoveryBasis, ScheduleRecompute};
use cronsentry_protocols::{EventKind, NotificationQueue};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap()
}

fn job(owner: &str, name: &str) -> Job {
    let expect = next_expect("*/5 * * * *", None, 2, t0()).unwrap();
    Job::new(owner, name, "*/5 * * * *", 2, expect, t0())
}

fn policy(basis: RecoveryBasis) -> Arc<dyn NextExpectPolicy> {
    Arc::new(ScheduleRecompute::new(basis))
}

#[tokio::test]
async fn test_store_id() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    assert_eq!(store.id(), "sqlite");
    store.ping().await.unwrap();
}

#[tokio::test]
async fn test_create_and_get() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup")
        .with_description("nightly database dump")
        .with_timezone("+02:00");
    store.create(&job).await.unwrap();

    let stored = store.get(&job.id).await.unwrap();
    assert_eq!(stored, job);
}

#[tokio::test]
async fn test_create_duplicate_conflicts() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();

    let err = store.create(&job).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_get_missing_job() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let err = store.get("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_users_upsert() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    store
        .upsert_user(&User::new("u1", "old@example.com", "Ops", t0()))
        .await
        .unwrap();
    store
        .upsert_user(&User::new("u1", "new@example.com", "Ops Team", t0()))
        .await
        .unwrap();

    let user = store.get_user("u1").await.unwrap();
    assert_eq!(user.email, "new@example.com");
    assert_eq!(user.name, "Ops Team");
    assert!(store.get_user("u2").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_list_by_owner_newest_first() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let mut older = job("owner", "older");
    older.created_at = t0() - ChronoDuration::hours(1);
    older.updated_at = older.created_at;
    let newer = job("owner", "newer");
    let foreign = job("someone-else", "foreign");
    for j in [&older, &newer, &foreign] {
        store.create(j).await.unwrap();
    }

    let jobs = store.list_by_owner("owner").await.unwrap();
    let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["newer", "older"]);
    assert!(store.list_by_owner("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_guards_against_stale_reads() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();

    let mut edit = store.get(&job.id).await.unwrap();
    edit.name = "renamed".to_string();
    let later = t0() + ChronoDuration::minutes(1);
    let updated = store.update(&edit, later).await.unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.updated_at, later);

    // `edit` still carries the old updated_at.
    edit.name = "lost update".to_string();
    let err = store.update(&edit, later).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.get(&job.id).await.unwrap().name, "renamed");
}

#[tokio::test]
async fn test_update_rejects_foreign_owner() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();

    let mut hijack = job.clone();
    hijack.owner_id = "intruder".to_string();
    let err = store.update(&hijack, t0()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFoundOrNotOwned(_)));
}

#[tokio::test]
async fn test_delete_cascades() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();
    let late = t0() + ChronoDuration::minutes(7);
    assert!(store.mark_missing_if_still_healthy_or_late(&job.id, late).await.unwrap());

    let err = store.delete(&job.id, "intruder").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFoundOrNotOwned(_)));

    store.delete(&job.id, "owner").await.unwrap();
    assert!(store.get(&job.id).await.unwrap_err().is_not_found());
    assert!(store.list_events(&job.id, 10).await.unwrap().is_empty());
    assert!(store.list_notifications(&job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missed_run_and_recovery() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();
    assert_eq!(job.next_expect, t0() + ChronoDuration::minutes(7));

    let late = t0() + ChronoDuration::minutes(7);
    let overdue = store.sweep_overdue(late).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert!(store.mark_missing_if_still_healthy_or_late(&job.id, late).await.unwrap());
    assert!(!store.mark_missing_if_still_healthy_or_late(&job.id, late).await.unwrap());
    assert_eq!(store.get(&job.id).await.unwrap().status, JobStatus::Missing);
    assert_eq!(store.list_notifications(&job.id).await.unwrap().len(), 1);

    let ping_at = late + ChronoDuration::seconds(30);
    let outcome = store
        .record_ping_and_maybe_recover(&job.id, ping_at, policy(RecoveryBasis::PingInstant))
        .await
        .unwrap();
    assert!(outcome.recovered());
    assert_eq!(outcome.next_expect, t0() + ChronoDuration::minutes(12));

    let stored = store.get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Healthy);
    assert_eq!(stored.last_ping, Some(ping_at));

    let events = store.list_events(&job.id, 10).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Recovery, EventKind::Miss]);
}

#[tokio::test]
async fn test_missed_fire_recovery_basis() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();
    let late = t0() + ChronoDuration::minutes(7);
    store.mark_missing_if_still_healthy_or_late(&job.id, late).await.unwrap();

    let outcome = store
        .record_ping_and_maybe_recover(
            &job.id,
            late + ChronoDuration::seconds(30),
            policy(RecoveryBasis::MissedFire),
        )
        .await
        .unwrap();
    assert_eq!(outcome.next_expect, t0() + ChronoDuration::minutes(12));
}

#[tokio::test]
async fn test_paused_job_ping_keeps_status() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let mut job = job("owner", "backup");
    job.status = JobStatus::Paused;
    store.create(&job).await.unwrap();

    let far_future = t0() + ChronoDuration::days(2);
    assert!(store.sweep_overdue(far_future).await.unwrap().is_empty());

    let outcome = store
        .record_ping_and_maybe_recover(&job.id, far_future, policy(RecoveryBasis::PingInstant))
        .await
        .unwrap();
    assert_eq!(outcome.status, JobStatus::Paused);
    assert!(!outcome.recovered());
    let events = store.list_events(&job.id, 10).await.unwrap();
    assert_eq!(events[0].kind, EventKind::Ping);
}

#[tokio::test]
async fn test_ping_unknown_job() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let err = store
        .record_ping_and_maybe_recover("ghost", t0(), policy(RecoveryBasis::PingInstant))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_mark_missing_requires_lateness() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();

    let early = t0() + ChronoDuration::minutes(6);
    assert!(!store.mark_missing_if_still_healthy_or_late(&job.id, early).await.unwrap());
    assert!(!store.mark_missing_if_still_healthy_or_late("ghost", early).await.unwrap());
}

#[tokio::test]
async fn test_list_events_limit() {
    let store = SqliteJobStore::in_memory().await.unwrap();
    let job = job("owner", "backup");
    store.create(&job).await.unwrap();
    for minute in 1..=5 {
        store
            .record_ping_and_maybe_recover(
                &job.id,
                t0() + ChronoDuration::minutes(minute),
                policy(RecoveryBasis::PingInstant),
            )
            .await
            .unwrap();
    }

    let events = store.list_events(&job.id, 3).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].created_at, t0() + ChronoDuration::minutes(5));
    assert!(events.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn test_file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cronsentry.db");
    let job = job("owner", "backup");

    {
        let store = SqliteJobStore::open(&path).await.unwrap();
        store.create(&job).await.unwrap();
    }

    let reopened = SqliteJobStore::open(&path).await.unwrap();
    assert_eq!(reopened.get(&job.id).await.unwrap(), job);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mark_missing_transitions_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cronsentry.db");
    let job = job("owner", "backup");
    let first = Arc::new(SqliteJobStore::open(&path).await.unwrap());
    let second = Arc::new(SqliteJobStore::open(&path).await.unwrap());
    first.create(&job).await.unwrap();

    let late = t0() + ChronoDuration::minutes(8);
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = if i % 2 == 0 { first.clone() } else { second.clone() };
        let id = job.id.clone();
        handles.push(tokio::spawn(async move {
            store.mark_missing_if_still_healthy_or_late(&id, late).await.unwrap()
        }));
    }

    let mut transitions = 0;
    for handle in handles {
        if handle.await.unwrap() {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);
    assert_eq!(first.list_notifications(&job.id).await.unwrap().len(), 1);
}

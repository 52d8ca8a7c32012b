use super::*;
use chrono::TimeZone;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
}

#[test]
fn test_job_status_default() {
    assert_eq!(JobStatus::default(), JobStatus::Healthy);
}

#[test]
fn test_job_status_serialization() {
    let json = serde_json::to_string(&JobStatus::Missing).unwrap();
    assert_eq!(json, "\"missing\"");

    let parsed: JobStatus = serde_json::from_str("\"paused\"").unwrap();
    assert_eq!(parsed, JobStatus::Paused);
}

#[test]
fn test_job_status_from_str() {
    assert_eq!("healthy".parse::<JobStatus>().unwrap(), JobStatus::Healthy);
    let err = "sleeping".parse::<JobStatus>().unwrap_err();
    assert!(err.to_string().contains("sleeping"));
}

#[test]
fn test_job_new_defaults() {
    let job = Job::new("owner-1", "backup", "*/5 * * * *", 2, at(10, 7), at(10, 0));
    assert_eq!(job.status, JobStatus::Healthy);
    assert!(job.last_ping.is_none());
    assert_eq!(job.created_at, job.updated_at);
    assert!(uuid::Uuid::parse_str(&job.id).is_ok());
}

#[test]
fn test_job_ids_are_unique() {
    let a = Job::new("o", "a", "@hourly", 0, at(11, 0), at(10, 0));
    let b = Job::new("o", "b", "@hourly", 0, at(11, 0), at(10, 0));
    assert_ne!(a.id, b.id);
}

#[test]
fn test_nominal_fire_subtracts_grace() {
    let job = Job::new("o", "j", "*/5 * * * *", 2, at(10, 7), at(10, 0));
    assert_eq!(job.grace(), Duration::minutes(2));
    assert_eq!(job.nominal_fire(), at(10, 5));
}

#[test]
fn test_job_serializes_grace_as_grace_time() {
    let job = Job::new("o", "j", "@daily", 15, at(10, 0), at(9, 0)).with_timezone("+02:00");
    let json = serde_json::to_value(&job).unwrap();
    assert_eq!(json["grace_time"], 15);
    assert_eq!(json["timezone"], "+02:00");
    assert_eq!(json["status"], "healthy");
    assert!(json.get("description").is_none());
}

#[test]
fn test_ping_outcome_recovered() {
    let outcome = PingOutcome {
        job_id: "j".to_string(),
        prior_status: JobStatus::Missing,
        status: JobStatus::Healthy,
        last_ping: at(10, 7),
        next_expect: at(10, 12),
    };
    assert!(outcome.recovered());

    let paused = PingOutcome {
        prior_status: JobStatus::Paused,
        status: JobStatus::Paused,
        ..outcome
    };
    assert!(!paused.recovered());
}

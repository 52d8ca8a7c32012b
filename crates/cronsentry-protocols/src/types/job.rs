//! Monitored job records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Health status of a monitored job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Checked in on time (or not yet due).
    Healthy,
    /// The detector saw `next_expect` pass without a ping.
    Missing,
    /// Excluded from sweeps until resumed.
    Paused,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Healthy => "healthy",
            JobStatus::Missing => "missing",
            JobStatus::Paused => "paused",
        }
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Healthy
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(JobStatus::Healthy),
            "missing" => Ok(JobStatus::Missing),
            "paused" => Ok(JobStatus::Paused),
            other => Err(UnknownVariant::new("job status", other)),
        }
    }
}

/// A job that reports liveness by pinging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cron expression (5, 6 or 7 fields, or an `@` macro).
    pub schedule: String,
    /// `UTC`, an IANA zone such as `Europe/Berlin`, or a fixed `+HH:MM`
    /// offset; `None` means UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Slack after each nominal fire time, in minutes.
    #[serde(rename = "grace_time")]
    pub grace_minutes: u32,
    pub last_ping: Option<DateTime<Utc>>,
    pub next_expect: DateTime<Utc>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a healthy job with a fresh ID.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        schedule: impl Into<String>,
        grace_minutes: u32,
        next_expect: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            schedule: schedule.into(),
            timezone: None,
            grace_minutes,
            last_ping: None,
            next_expect,
            status: JobStatus::Healthy,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn grace(&self) -> Duration {
        Duration::minutes(i64::from(self.grace_minutes))
    }

    /// The nominal fire instant `next_expect` was derived from.
    pub fn nominal_fire(&self) -> DateTime<Utc> {
        self.next_expect - self.grace()
    }

    pub fn is_paused(&self) -> bool {
        self.status == JobStatus::Paused
    }
}

/// Result of recording a ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingOutcome {
    pub job_id: String,
    pub prior_status: JobStatus,
    pub status: JobStatus,
    pub last_ping: DateTime<Utc>,
    pub next_expect: DateTime<Utc>,
}

impl PingOutcome {
    /// Whether this ping moved the job from Missing back to Healthy.
    pub fn recovered(&self) -> bool {
        self.prior_status == JobStatus::Missing && self.status == JobStatus::Healthy
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

//! Alert notifications queued for delivery.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Job, UnknownVariant};

/// The only channel the dispatcher delivers.
pub const EMAIL_CHANNEL: &str = "email";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(UnknownVariant::new("notification status", other)),
        }
    }
}

/// Text stored on a notification raised for a missed run.
pub fn missed_run_message(job_name: &str) -> String {
    format!("Job '{}' has missed its scheduled run time", job_name)
}

/// A queued alert about one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub job_id: String,
    pub user_id: String,
    pub message: String,
    /// Delivery channel name; see [`EMAIL_CHANNEL`].
    #[serde(rename = "type")]
    pub channel: String,
    pub status: NotificationStatus,
    /// Free-form payload. Failures record their reason under `error`.
    pub data: serde_json::Value,
    /// Send attempts made so far.
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Pending email alert for a job that missed its check-in.
    pub fn missed_run(job: &Job, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            user_id: job.owner_id.clone(),
            message: missed_run_message(&job.name),
            channel: EMAIL_CHANNEL.to_string(),
            status: NotificationStatus::Pending,
            data: serde_json::json!({}),
            attempts: 0,
            next_attempt_at: None,
            sent_at: None,
            created_at: now,
        }
    }

    /// Reason recorded by the last failed attempt. Cleared once the
    /// notification is sent.
    pub fn error(&self) -> Option<&str> {
        self.data.get("error").and_then(serde_json::Value::as_str)
    }

    pub fn is_pending(&self) -> bool {
        self.status == NotificationStatus::Pending
    }
}

/// Payload written when a delivery attempt fails.
pub fn failure_payload(reason: &str) -> serde_json::Value {
    serde_json::json!({ "error": reason })
}

/// A pending notification joined with what the dispatcher needs to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelivery {
    pub notification: Notification,
    pub job_name: String,
    /// Destination address; `None` when the owning user no longer exists.
    pub recipient: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job() -> Job {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Job::new("user-1", "nightly-backup", "@daily", 30, now, now)
    }

    #[test]
    fn test_missed_run_message() {
        assert_eq!(
            missed_run_message("etl"),
            "Job 'etl' has missed its scheduled run time"
        );
    }

    #[test]
    fn test_missed_run_notification() {
        let job = job();
        let n = Notification::missed_run(&job, job.created_at);
        assert_eq!(n.job_id, job.id);
        assert_eq!(n.user_id, "user-1");
        assert_eq!(n.channel, EMAIL_CHANNEL);
        assert!(n.is_pending());
        assert_eq!(n.attempts, 0);
        assert!(n.sent_at.is_none());
        assert!(n.error().is_none());
        assert!(n.message.contains("nightly-backup"));
    }

    #[test]
    fn test_error_reads_payload() {
        let mut n = Notification::missed_run(&job(), Utc::now());
        n.data = failure_payload("smtp down");
        assert_eq!(n.error(), Some("smtp down"));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "failed".parse::<NotificationStatus>().unwrap(),
            NotificationStatus::Failed
        );
        assert!("queued".parse::<NotificationStatus>().is_err());
    }
}

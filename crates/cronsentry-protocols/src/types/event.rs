//! Append-only job history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Ping,
    Miss,
    Recovery,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ping => "ping",
            EventKind::Miss => "miss",
            EventKind::Recovery => "recovery",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ping" => Ok(EventKind::Ping),
            "miss" => Ok(EventKind::Miss),
            "recovery" => Ok(EventKind::Recovery),
            other => Err(UnknownVariant::new("event kind", other)),
        }
    }
}

/// One entry in a job's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub id: String,
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(
        job_id: impl Into<String>,
        kind: EventKind,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            kind,
            data,
            created_at: now,
        }
    }

    /// Ping or recovery event carrying the recomputed expectation.
    pub fn checked_in(
        job_id: impl Into<String>,
        recovered: bool,
        next_expect: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let kind = if recovered {
            EventKind::Recovery
        } else {
            EventKind::Ping
        };
        Self::new(
            job_id,
            kind,
            serde_json::json!({ "next_expect": next_expect }),
            now,
        )
    }

    /// Miss event recording the expectation that lapsed.
    pub fn missed(job_id: impl Into<String>, expected_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::new(
            job_id,
            EventKind::Miss,
            serde_json::json!({ "expected_at": expected_at }),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_kind_round_trip() {
        for kind in [EventKind::Ping, EventKind::Miss, EventKind::Recovery] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("pong".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_checked_in_kind() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(JobEvent::checked_in("j", false, now, now).kind, EventKind::Ping);
        assert_eq!(JobEvent::checked_in("j", true, now, now).kind, EventKind::Recovery);
    }

    #[test]
    fn test_missed_payload() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 7, 0).unwrap();
        let event = JobEvent::missed("j", now, now);
        assert_eq!(event.kind, EventKind::Miss);
        assert_eq!(event.data["expected_at"], "2026-01-01T00:07:00Z");
    }

    #[test]
    fn test_event_serializes_kind_as_type() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(JobEvent::checked_in("j", true, now, now)).unwrap();
        assert_eq!(json["type"], "recovery");
    }
}

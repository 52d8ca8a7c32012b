//! Column encoding shared by the job and notification queries.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

use cronsentry_protocols::{Job, JobEvent, Notification, StoreError};

pub(crate) const JOB_COLUMNS: &str = "id, owner_id, name, description, schedule, timezone, \
     grace_minutes, last_ping, next_expect, status, created_at, updated_at";

pub(crate) const EVENT_COLUMNS: &str = "id, job_id, type, data, created_at";

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, job_id, user_id, message, type, status, data, \
     attempts, next_attempt_at, sent_at, created_at";

/// Timestamps are stored as fixed-width UTC text so that string order is
/// time order.
pub(crate) fn to_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn opt_to_text(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(to_text)
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(idx, &raw)
}

fn opt_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_time(idx, &raw)).transpose()
}

fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        schedule: row.get(4)?,
        timezone: row.get(5)?,
        grace_minutes: row.get(6)?,
        last_ping: opt_time_column(row, 7)?,
        next_expect: time_column(row, 8)?,
        status: enum_column(row, 9)?,
        created_at: time_column(row, 10)?,
        updated_at: time_column(row, 11)?,
    })
}

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<JobEvent> {
    Ok(JobEvent {
        id: row.get(0)?,
        job_id: row.get(1)?,
        kind: enum_column(row, 2)?,
        data: json_column(row, 3)?,
        created_at: time_column(row, 4)?,
    })
}

pub(crate) fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        job_id: row.get(1)?,
        user_id: row.get(2)?,
        message: row.get(3)?,
        channel: row.get(4)?,
        status: enum_column(row, 5)?,
        data: json_column(row, 6)?,
        attempts: row.get(7)?,
        next_attempt_at: opt_time_column(row, 8)?,
        sent_at: opt_time_column(row, 9)?,
        created_at: time_column(row, 10)?,
    })
}

/// Map a connection-thread failure onto the store error space.
pub(crate) fn storage_error(e: tokio_rusqlite::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

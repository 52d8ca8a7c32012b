//! SQLite implementation of [`NotificationQueue`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use cronsentry_protocols::{
    failure_payload, Notification, NotificationQueue, NotificationStatus, PendingDelivery,
    StoreError,
};

use crate::rows::{notification_from_row, opt_to_text, storage_error, to_text, NOTIFICATION_COLUMNS};
use crate::store::SqliteJobStore;

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;

const PENDING_DELIVERIES: &str = "
    SELECT n.id, n.job_id, n.user_id, n.message, n.type, n.status, n.data,
           n.attempts, n.next_attempt_at, n.sent_at, n.created_at,
           j.name, u.email
    FROM notifications n
    JOIN jobs j ON j.id = n.job_id
    LEFT JOIN users u ON u.id = n.user_id
    WHERE n.status = ?1 AND (n.next_attempt_at IS NULL OR n.next_attempt_at <= ?2)
    ORDER BY n.created_at ASC, n.rowid ASC
    LIMIT ?3";

pub(crate) fn insert_notification(
    conn: &rusqlite::Connection,
    notification: &Notification,
) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO notifications ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            NOTIFICATION_COLUMNS
        ),
        params![
            notification.id,
            notification.job_id,
            notification.user_id,
            notification.message,
            notification.channel,
            notification.status.as_str(),
            notification.data.to_string(),
            notification.attempts,
            opt_to_text(notification.next_attempt_at),
            opt_to_text(notification.sent_at),
            to_text(notification.created_at)
        ],
    )?;
    Ok(())
}

/// Outcome of a guarded update on a notification that must still be
/// pending. When no row changed, reports whether it is gone or already
/// settled.
fn pending_outcome(
    conn: &rusqlite::Connection,
    id: &str,
    changed: usize,
) -> rusqlite::Result<Result<(), StoreError>> {
    if changed > 0 {
        return Ok(Ok(()));
    }
    let status: Option<String> = conn
        .query_row("SELECT status FROM notifications WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(Err(match status {
        Some(status) => {
            StoreError::Conflict(format!("notification {} is already {}", id, status))
        }
        None => StoreError::NotFound(id.to_string()),
    }))
}

#[async_trait]
impl NotificationQueue for SqliteJobStore {
    async fn fetch_pending_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PendingDelivery>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(PENDING_DELIVERIES)?;
                let batch = stmt
                    .query_map(
                        params![NotificationStatus::Pending.as_str(), to_text(now), limit],
                        |row| {
                            Ok(PendingDelivery {
                                notification: notification_from_row(row)?,
                                job_name: row.get(11)?,
                                recipient: row.get(12)?,
                            })
                        },
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(batch)
            })
            .await
            .map_err(storage_error)
    }

    async fn mark_notification_sent(
        &self,
        id: &str,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE notifications
                     SET status = ?1, attempts = ?2, sent_at = ?3, next_attempt_at = NULL,
                         data = json_remove(data, '$.error')
                     WHERE id = ?4 AND status = ?5",
                    params![
                        NotificationStatus::Sent.as_str(),
                        attempts,
                        to_text(now),
                        id,
                        NotificationStatus::Pending.as_str()
                    ],
                )?;
                Ok(pending_outcome(conn, &id, changed)?)
            })
            .await
            .map_err(storage_error)?
    }

    async fn mark_notification_failed(
        &self,
        id: &str,
        reason: &str,
        attempts: u32,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        let data = failure_payload(reason).to_string();
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE notifications SET status = ?1, attempts = ?2, data = ?3, next_attempt_at = NULL
                     WHERE id = ?4 AND status = ?5",
                    params![
                        NotificationStatus::Failed.as_str(),
                        attempts,
                        data,
                        id,
                        NotificationStatus::Pending.as_str()
                    ],
                )?;
                Ok(pending_outcome(conn, &id, changed)?)
            })
            .await
            .map_err(storage_error)?
    }

    async fn schedule_notification_retry(
        &self,
        id: &str,
        reason: &str,
        attempts: u32,
        retry_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        let data = failure_payload(reason).to_string();
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE notifications SET attempts = ?1, data = ?2, next_attempt_at = ?3
                     WHERE id = ?4 AND status = ?5",
                    params![
                        attempts,
                        data,
                        to_text(retry_at),
                        id,
                        NotificationStatus::Pending.as_str()
                    ],
                )?;
                Ok(pending_outcome(conn, &id, changed)?)
            })
            .await
            .map_err(storage_error)?
    }

    async fn get_notification(&self, id: &str) -> Result<Notification, StoreError> {
        let lookup = id.to_string();
        self.conn
            .call(move |conn| {
                let notification = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM notifications WHERE id = ?1",
                            NOTIFICATION_COLUMNS
                        ),
                        [&lookup],
                        notification_from_row,
                    )
                    .optional()?;
                Ok(notification)
            })
            .await
            .map_err(storage_error)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_notifications(&self, job_id: &str) -> Result<Vec<Notification>, StoreError> {
        let job_id = job_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM notifications WHERE job_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                    NOTIFICATION_COLUMNS
                ))?;
                let notifications = stmt
                    .query_map([&job_id], notification_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(notifications)
            })
            .await
            .map_err(storage_error)
    }
}

//! SQLite implementation of [`JobStore`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tokio_rusqlite::Connection;
use tracing::{debug, instrument};

use cronsentry_protocols::{
    Job, JobEvent, JobStatus, JobStore, NextExpectPolicy, Notification, PingOutcome, StoreError,
    User,
};

use crate::notifications::insert_notification;
use crate::rows::{
    event_from_row, job_from_row, opt_to_text, storage_error, to_text, EVENT_COLUMNS, JOB_COLUMNS,
};
use crate::schema::init_schema;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Job store backed by one SQLite connection.
pub struct SqliteJobStore {
    pub(crate) conn: Connection,
}

impl SqliteJobStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::init(conn, false).await
    }

    /// Open or create a file-backed database, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
        }

        let conn = Connection::open(&path)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        debug!(path = %path.display(), "Opened SQLite job store");
        Self::init(conn, true).await
    }

    async fn init(conn: Connection, wal: bool) -> Result<Self, StoreError> {
        conn.call(move |conn| {
            if wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(init_schema(conn)?)
        })
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { conn })
    }
}

fn select_job(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<Job>> {
    conn.query_row(
        &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
        [id],
        job_from_row,
    )
    .optional()
}

fn insert_event(conn: &rusqlite::Connection, event: &JobEvent) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO job_events (id, job_id, type, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.id,
            event.job_id,
            event.kind.as_str(),
            event.data.to_string(),
            to_text(event.created_at)
        ],
    )?;
    Ok(())
}

#[async_trait]
impl JobStore for SqliteJobStore {
    fn id(&self) -> &str {
        "sqlite"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET email = excluded.email, name = excluded.name",
                    params![user.id, user.email, user.name, to_text(user.created_at)],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_error)
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        let id = id.to_string();
        let lookup = id.clone();
        let user = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, email, name, created_at FROM users WHERE id = ?1",
                        [&lookup],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(storage_error)?;

        let (id, email, name, created) = user.ok_or(StoreError::NotFound(id))?;
        let created_at = DateTime::parse_from_rfc3339(&created)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .with_timezone(&Utc);
        Ok(User {
            id,
            email,
            name,
            created_at,
        })
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let job = job.clone();
        let id = job.id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        JOB_COLUMNS
                    ),
                    params![
                        job.id,
                        job.owner_id,
                        job.name,
                        job.description,
                        job.schedule,
                        job.timezone,
                        job.grace_minutes,
                        opt_to_text(job.last_ping),
                        to_text(job.next_expect),
                        job.status.as_str(),
                        to_text(job.created_at),
                        to_text(job.updated_at)
                    ],
                )?;
                Ok(inserted)
            })
            .await
            .map_err(storage_error)?;

        if inserted == 0 {
            return Err(StoreError::Conflict(format!("job {} already exists", id)));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Job, StoreError> {
        let lookup = id.to_string();
        self.conn
            .call(move |conn| Ok(select_job(conn, &lookup)?))
            .await
            .map_err(storage_error)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, StoreError> {
        let owner_id = owner_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE owner_id = ?1 ORDER BY created_at DESC, id ASC",
                    JOB_COLUMNS
                ))?;
                let jobs = stmt
                    .query_map([&owner_id], job_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(storage_error)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn update(&self, job: &Job, now: DateTime<Utc>) -> Result<Job, StoreError> {
        let job = job.clone();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let changed = tx.execute(
                    "UPDATE jobs SET name = ?1, description = ?2, schedule = ?3, timezone = ?4,
                         grace_minutes = ?5, next_expect = ?6, status = ?7, updated_at = ?8
                     WHERE id = ?9 AND owner_id = ?10 AND updated_at = ?11",
                    params![
                        job.name,
                        job.description,
                        job.schedule,
                        job.timezone,
                        job.grace_minutes,
                        to_text(job.next_expect),
                        job.status.as_str(),
                        to_text(now),
                        job.id,
                        job.owner_id,
                        to_text(job.updated_at)
                    ],
                )?;

                if changed == 0 {
                    let owned = select_job(&tx, &job.id)?
                        .is_some_and(|stored| stored.owner_id == job.owner_id);
                    return Ok(Err(if owned {
                        StoreError::Conflict(format!("job {} changed since it was read", job.id))
                    } else {
                        StoreError::NotFoundOrNotOwned(job.id.clone())
                    }));
                }

                let stored = select_job(&tx, &job.id)?;
                tx.commit()?;
                Ok(stored.ok_or_else(|| StoreError::NotFound(job.id.clone())))
            })
            .await
            .map_err(storage_error)?
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        let lookup = id.to_string();
        let owner_id = owner_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM jobs WHERE id = ?1 AND owner_id = ?2",
                    params![lookup, owner_id],
                )?)
            })
            .await
            .map_err(storage_error)?;

        if deleted == 0 {
            return Err(StoreError::NotFoundOrNotOwned(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, policy))]
    async fn record_ping_and_maybe_recover(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
        policy: Arc<dyn NextExpectPolicy>,
    ) -> Result<PingOutcome, StoreError> {
        let job_id = job_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let Some(job) = select_job(&tx, &job_id)? else {
                    return Ok(Err(StoreError::NotFound(job_id)));
                };

                let next_expect = match policy.next_expect(&job, now) {
                    Ok(next_expect) => next_expect,
                    Err(reason) => return Ok(Err(StoreError::Schedule(reason))),
                };
                let recovered = job.status == JobStatus::Missing;
                let status = if recovered {
                    JobStatus::Healthy
                } else {
                    job.status
                };

                tx.execute(
                    "UPDATE jobs SET last_ping = ?1, next_expect = ?2, status = ?3, updated_at = ?1
                     WHERE id = ?4",
                    params![to_text(now), to_text(next_expect), status.as_str(), job.id],
                )?;
                insert_event(
                    &tx,
                    &JobEvent::checked_in(job.id.clone(), recovered, next_expect, now),
                )?;
                tx.commit()?;

                Ok(Ok(PingOutcome {
                    job_id: job.id,
                    prior_status: job.status,
                    status,
                    last_ping: now,
                    next_expect,
                }))
            })
            .await
            .map_err(storage_error)?
    }

    async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE status != ?1 AND next_expect <= ?2
                     ORDER BY next_expect ASC",
                    JOB_COLUMNS
                ))?;
                let jobs = stmt
                    .query_map(params![JobStatus::Paused.as_str(), to_text(now)], job_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(storage_error)
    }

    #[instrument(skip(self))]
    async fn mark_missing_if_still_healthy_or_late(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let job_id = job_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let late = select_job(&tx, &job_id)?
                    .filter(|job| job.status == JobStatus::Healthy && job.next_expect <= now);
                let Some(job) = late else {
                    return Ok(false);
                };

                let changed = tx.execute(
                    "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                    params![
                        JobStatus::Missing.as_str(),
                        to_text(now),
                        job.id,
                        JobStatus::Healthy.as_str()
                    ],
                )?;
                if changed == 0 {
                    return Ok(false);
                }

                insert_event(&tx, &JobEvent::missed(job.id.clone(), job.next_expect, now))?;
                insert_notification(&tx, &Notification::missed_run(&job, now))?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(storage_error)
    }

    async fn list_events(&self, job_id: &str, limit: usize) -> Result<Vec<JobEvent>, StoreError> {
        let job_id = job_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM job_events WHERE job_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    EVENT_COLUMNS
                ))?;
                let events = stmt
                    .query_map(params![job_id, limit], event_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await
            .map_err(storage_error)
    }
}

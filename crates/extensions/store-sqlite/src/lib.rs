//! SQLite job store for CronSentry.
//!
//! Persists users, jobs, job events and notifications in one SQLite file
//! (WAL mode, foreign keys on). Every status transition runs inside a single
//! immediate transaction.

mod notifications;
mod rows;
mod schema;
mod store;

pub use store::SqliteJobStore;

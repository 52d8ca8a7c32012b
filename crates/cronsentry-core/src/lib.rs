//! # CronSentry Core
//!
//! The job health monitoring engine: schedule evaluation, the status state
//! machine, the missed-run detector and the notification dispatcher.
//!
//! Everything here talks to storage and delivery through the traits in
//! `cronsentry-protocols`, so the engine runs unchanged against SQLite or
//! the bundled [`MemoryJobStore`].

pub mod clock;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod memory_store;
pub mod periodic;
pub mod ping;
pub mod render;
pub mod schedule;

pub use clock::{Clock, ManualClock, SystemClock};
pub use detector::{MissedRunDetector, SweepReport};
pub use dispatcher::{DispatchReport, DispatcherSettings, NotificationDispatcher, RetryPolicy};
pub use error::MonitorError;
pub use jobs::{JobPatch, JobService, NewJob};
pub use memory_store::MemoryJobStore;
pub use periodic::{run_periodic, spawn_periodic, PeriodicTask};
pub use ping::PingHandler;
pub use schedule::{
    is_due, next_expect, next_fire_after, CronSchedule, RecoveryBasis, ScheduleError,
    ScheduleRecompute, ScheduleZone, MAX_GRACE_MINUTES,
};

//! # CronSentry Protocols
//!
//! Records and access contracts shared by every CronSentry crate.
//! Contains only definitions - no storage or transport implementations.
//!
//! ## Core Traits
//!
//! - [`JobStore`] - Persisted jobs, events and the status transitions on them
//! - [`NotificationQueue`] - Pending notification bookkeeping for the dispatcher
//! - [`NextExpectPolicy`] - Recomputes `next_expect` inside a ping transaction
//! - [`NotificationSender`] - Delivery transport for rendered alerts

pub mod error;
pub mod sender;
pub mod store;
pub mod types;

pub use error::{SendError, StoreError};
pub use sender::NotificationSender;
pub use store::{JobStore, NextExpectPolicy, NotificationQueue};
pub use types::*;

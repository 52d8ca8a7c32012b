//! Records shared across the CronSentry crates.

mod event;
mod job;
mod notification;
mod user;

pub use event::*;
pub use job::*;
pub use notification::*;
pub use user::*;

use thiserror::Error;

/// A stored enum column held a value no variant maps to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

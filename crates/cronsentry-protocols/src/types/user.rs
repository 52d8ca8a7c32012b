//! Notification recipients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job owner. Only `email` is consumed when dispatching alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            created_at: now,
        }
    }
}

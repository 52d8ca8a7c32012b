//! Notification transport protocol.

use async_trait::async_trait;

use crate::error::SendError;

/// Delivers a rendered alert to one recipient.
///
/// Any error is final for that attempt; retry decisions belong to the caller.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Returns the transport name.
    fn name(&self) -> &str;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError>;
}

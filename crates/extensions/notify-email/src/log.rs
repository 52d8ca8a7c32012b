//! Log-only transport.

use async_trait::async_trait;
use tracing::info;

use cronsentry_protocols::{NotificationSender, SendError};

/// Writes each alert to the log instead of sending it.
pub struct LogSender {
    from: String,
}

impl LogSender {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl NotificationSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "Email would be sent (no transport configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = LogSender::new("alerts@cronsentry.local");
        assert_eq!(sender.name(), "log");
        sender
            .send("ops@example.com", "CronSentry Alert: Job 'x'", "<p>hi</p>")
            .await
            .unwrap();
    }
}

//! Notification dispatch.
//!
//! Each cycle fetches a bounded batch of pending notifications, renders and
//! sends them, then records the outcome per notification. One failure never
//! aborts the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use cronsentry_protocols::{
    NotificationQueue, NotificationSender, PendingDelivery, StoreError, EMAIL_CHANNEL,
};

use crate::clock::Clock;
use crate::error::MonitorError;
use crate::periodic::PeriodicTask;
use crate::render::{alert_body, alert_subject};

/// Failure reason for notifications on a channel other than email.
pub const UNSUPPORTED_CHANNEL: &str = "unsupported channel";

/// Failure reason when the job owner no longer exists.
pub const RECIPIENT_NOT_FOUND: &str = "recipient not found";

/// How many times a notification may be attempted and how long to wait
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// A single attempt; any send failure is final.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base: Duration::from_secs(60),
            max: Duration::from_secs(3600),
        }
    }

    /// Delay before the next attempt once `attempts` have been made.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub dashboard_url: Option<String>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            retry: RetryPolicy::none(),
            dashboard_url: None,
        }
    }
}

/// Counters for one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    pub retried: usize,
    /// Outcomes that could not be recorded.
    pub errors: usize,
}

enum Outcome {
    Sent,
    Failed,
    Retried,
}

pub struct NotificationDispatcher {
    queue: Arc<dyn NotificationQueue>,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
    settings: DispatcherSettings,
}

impl NotificationDispatcher {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            queue,
            sender,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Process one batch. Fails only when the batch cannot be fetched.
    pub async fn dispatch(&self) -> Result<DispatchReport, MonitorError> {
        let now = self.clock.now();
        let batch = self
            .queue
            .fetch_pending_notifications(now, self.settings.batch_size)
            .await?;
        let mut report = DispatchReport {
            fetched: batch.len(),
            ..Default::default()
        };

        for delivery in &batch {
            match self.deliver(delivery, now).await {
                Ok(Outcome::Sent) => report.sent += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Retried) => report.retried += 1,
                Err(e) => {
                    report.errors += 1;
                    error!(
                        notification_id = %delivery.notification.id,
                        "Failed to record notification outcome: {}", e
                    );
                }
            }
        }

        if report.fetched > 0 {
            info!(
                fetched = report.fetched,
                sent = report.sent,
                failed = report.failed,
                retried = report.retried,
                "Dispatch cycle complete"
            );
        }
        Ok(report)
    }

    async fn deliver(
        &self,
        delivery: &PendingDelivery,
        now: DateTime<Utc>,
    ) -> Result<Outcome, StoreError> {
        let notification = &delivery.notification;

        if notification.channel != EMAIL_CHANNEL {
            warn!(
                notification_id = %notification.id,
                channel = %notification.channel,
                "Notification channel not supported"
            );
            self.queue
                .mark_notification_failed(&notification.id, UNSUPPORTED_CHANNEL, notification.attempts)
                .await?;
            return Ok(Outcome::Failed);
        }

        let Some(recipient) = delivery.recipient.as_deref() else {
            warn!(
                notification_id = %notification.id,
                user_id = %notification.user_id,
                "Notification recipient not found"
            );
            self.queue
                .mark_notification_failed(&notification.id, RECIPIENT_NOT_FOUND, notification.attempts)
                .await?;
            return Ok(Outcome::Failed);
        };

        let subject = alert_subject(&delivery.job_name);
        let body = alert_body(
            &notification.message,
            &delivery.job_name,
            now,
            self.settings.dashboard_url.as_deref(),
        );
        let attempts = notification.attempts.saturating_add(1);

        match self.sender.send(recipient, &subject, &body).await {
            Ok(()) => {
                self.queue
                    .mark_notification_sent(&notification.id, attempts, now)
                    .await?;
                debug!(notification_id = %notification.id, to = %recipient, "Notification sent");
                Ok(Outcome::Sent)
            }
            Err(e) => {
                let reason = e.to_string();
                if self.settings.retry.exhausted(attempts) {
                    warn!(
                        notification_id = %notification.id,
                        attempts,
                        "Notification failed: {}", reason
                    );
                    self.queue
                        .mark_notification_failed(&notification.id, &reason, attempts)
                        .await?;
                    Ok(Outcome::Failed)
                } else {
                    let retry_at = chrono::Duration::from_std(self.settings.retry.delay_for(attempts))
                        .ok()
                        .and_then(|delay| now.checked_add_signed(delay))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    warn!(
                        notification_id = %notification.id,
                        attempts,
                        retry_at = %retry_at,
                        "Notification attempt failed, will retry: {}", reason
                    );
                    self.queue
                        .schedule_notification_retry(&notification.id, &reason, attempts, retry_at)
                        .await?;
                    Ok(Outcome::Retried)
                }
            }
        }
    }
}

#[async_trait]
impl PeriodicTask for NotificationDispatcher {
    type Report = DispatchReport;

    fn name(&self) -> &'static str {
        "notification-dispatcher"
    }

    async fn run_once(&self) -> Result<DispatchReport, MonitorError> {
        self.dispatch().await
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

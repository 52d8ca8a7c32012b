//! SendGrid v3 mail transport.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use cronsentry_config::EmailConfig;
use cronsentry_protocols::{NotificationSender, SendError};

#[cfg(test)]
#[path = "sendgrid_tests.rs"]
mod tests;

/// Longest provider response body kept on a rejection; it ends up in the
/// notification payload.
const MAX_REJECTION_BODY: usize = 512;

pub struct SendGridSender {
    api_key: String,
    base_url: String,
    from_address: String,
    from_name: String,
    client: reqwest::Client,
}

impl SendGridSender {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        from_address: impl Into<String>,
        from_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::NotConfigured(format!("HTTP client: {}", e)))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            from_address: from_address.into(),
            from_name: from_name.into(),
            client,
        })
    }

    pub fn from_config(config: &EmailConfig) -> Result<Self, SendError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SendError::NotConfigured("sendgrid requires email.api_key".to_string()))?;
        Self::new(
            api_key,
            &config.api_base_url,
            &config.from_address,
            &config.from_name,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn payload(&self, to: &str, subject: &str, body: &str) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_address, "name": self.from_name },
            "subject": subject,
            "content": [{ "type": "text/html", "value": body }]
        })
    }
}

#[async_trait]
impl NotificationSender for SendGridSender {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let url = format!("{}/v3/mail/send", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(to, subject, body))
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("SendGrid request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %to, status = status.as_u16(), "SendGrid accepted message");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SendError::Rejected {
                status: status.as_u16(),
                body: truncate_body(body, MAX_REJECTION_BODY),
            })
        }
    }
}

fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body.push_str("...");
    body
}

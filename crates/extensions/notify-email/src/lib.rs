//! Email transports for CronSentry alerts.
//!
//! [`LogSender`] writes alerts to the log and always succeeds; it is the
//! default when no provider is configured. [`SendGridSender`] delivers through
//! the SendGrid v3 HTTP API.

mod log;
mod sendgrid;

use std::sync::Arc;

use cronsentry_config::EmailConfig;
use cronsentry_protocols::{NotificationSender, SendError};

pub use log::LogSender;
pub use sendgrid::SendGridSender;

/// Build the transport selected by `email.provider`.
pub fn build_sender(config: &EmailConfig) -> Result<Arc<dyn NotificationSender>, SendError> {
    match config.provider.as_str() {
        "log" => Ok(Arc::new(LogSender::new(&config.from_address))),
        "sendgrid" => Ok(Arc::new(SendGridSender::from_config(config)?)),
        other => Err(SendError::NotConfigured(format!(
            "unknown email provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_logs() {
        let sender = build_sender(&EmailConfig::default()).unwrap();
        assert_eq!(sender.name(), "log");
    }

    #[test]
    fn test_sendgrid_requires_key() {
        let config = EmailConfig {
            provider: "sendgrid".to_string(),
            ..Default::default()
        };
        let err = build_sender(&config).err().unwrap();
        assert!(matches!(err, SendError::NotConfigured(_)));
    }

    #[test]
    fn test_sendgrid_with_key() {
        let config = EmailConfig {
            provider: "sendgrid".to_string(),
            api_key: Some("SG.test".to_string()),
            ..Default::default()
        };
        assert_eq!(build_sender(&config).unwrap().name(), "sendgrid");
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmailConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        let err = build_sender(&config).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}

//! Notification transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    /// The request never reached the provider.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("Provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Sender not configured: {0}")]
    NotConfigured(String),
}

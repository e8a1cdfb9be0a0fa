/// Errors from the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or carries an
    /// invalid value (e.g. an unparseable sender address).
    #[error("notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to a webhook endpoint failed.
    #[error("notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook endpoint answered with a non-success status.
    #[error("notify: webhook returned status {status}: {body}")]
    WebhookStatus { status: u16, body: String },

    /// SMTP transport error when sending email.
    #[error("notify: SMTP error: {0}")]
    Smtp(String),

    /// JSON serialization of the payload failed.
    #[error("notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

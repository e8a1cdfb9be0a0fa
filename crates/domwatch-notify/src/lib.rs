//! Notification delivery with pluggable transports.
//!
//! Fired alerts are fanned out to every configured
//! [`NotificationChannel`]. Delivery is best-effort from the engine's
//! perspective: a transport failure is logged and isolated, never allowed
//! to fail the check cycle that produced the alert.

pub mod channels;
pub mod error;
pub mod manager;


use async_trait::async_trait;
use domwatch_common::types::AlertEvent;
use error::Result;

pub use manager::NotificationManager;

/// A transport that delivers alert events to an external service
/// (SMTP, chat webhook).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the alert through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails after the channel's internal
    /// retries.
    async fn send(&self, alert: &AlertEvent) -> Result<()>;

    /// Channel type name for logging (e.g. `"email"`, `"webhook"`).
    fn channel_name(&self) -> &str;
}

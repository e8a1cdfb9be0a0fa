use crate::NotificationChannel;
use domwatch_common::types::AlertEvent;

/// Fans a fired alert out to every configured channel.
///
/// Each channel failure is caught and logged in isolation; `notify` never
/// returns an error because alerting is best-effort and monitoring
/// correctness must not depend on delivery.
pub struct NotificationManager {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationManager {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub async fn notify(&self, event: &AlertEvent) {
        if self.channels.is_empty() {
            tracing::debug!(
                domain = %event.domain_name,
                category = %event.category,
                "No notification channels configured"
            );
            return;
        }

        for channel in &self.channels {
            match channel.send(event).await {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        domain = %event.domain_name,
                        category = %event.category,
                        severity = %event.severity,
                        "Alert notification sent"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        channel = channel.channel_name(),
                        domain = %event.domain_name,
                        category = %event.category,
                        error = %e,
                        "Alert notification failed"
                    );
                }
            }
        }
    }
}

use crate::error::{NotifyError, Result};
use crate::NotificationChannel;
use async_trait::async_trait;
use domwatch_common::types::AlertEvent;
use std::time::Duration;

/// Chat-webhook transport (Slack-compatible). Posts a `{"text": ...}`
/// payload by default; an optional `{{placeholder}}` template overrides
/// the body for other receivers.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
    body_template: Option<String>,
}

impl WebhookChannel {
    pub fn new(url: &str, body_template: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(NotifyError::Http)?;
        Ok(Self {
            client,
            url: url.to_string(),
            body_template,
        })
    }

    pub(crate) fn render_body(&self, alert: &AlertEvent) -> Result<String> {
        if let Some(template) = &self.body_template {
            Ok(template
                .replace("{{domain}}", &alert.domain_name)
                .replace("{{category}}", &alert.category.to_string())
                .replace("{{severity}}", &alert.severity.to_string())
                .replace("{{message}}", &alert.message)
                .replace(
                    "{{value}}",
                    &alert.value.map(|v| v.to_string()).unwrap_or_default(),
                )
                .replace("{{timestamp}}", &alert.fired_at.to_rfc3339()))
        } else {
            let text = format!(
                "[{}] {}: {}",
                alert.severity, alert.domain_name, alert.message
            );
            Ok(serde_json::to_string(&serde_json::json!({ "text": text }))?)
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &AlertEvent) -> Result<()> {
        let body = self.render_body(alert)?;

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let resp_body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::WebhookStatus {
                        status,
                        body: resp_body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(NotifyError::Http(e));
                }
            }
            if attempt < 2 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        Err(last_err.unwrap_or(NotifyError::WebhookStatus {
            status: 0,
            body: String::new(),
        }))
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

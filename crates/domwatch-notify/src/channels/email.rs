use crate::error::{NotifyError, Result};
use crate::NotificationChannel;
use async_trait::async_trait;
use domwatch_common::types::AlertEvent;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Delivery seam below [`EmailChannel`]. Production uses lettre's SMTP
/// transport; tests substitute a scripted one.
#[async_trait]
pub(crate) trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> std::result::Result<(), String>;
}

#[async_trait]
impl MailTransport for AsyncSmtpTransport<Tokio1Executor> {
    async fn deliver(&self, message: Message) -> std::result::Result<(), String> {
        self.send(message).await.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// SMTP email transport. Sends one message per recipient, retrying each
/// up to three times with exponential backoff; `send` fails when any
/// recipient could not be delivered to, even if others succeeded.
pub struct EmailChannel {
    transport: Box<dyn MailTransport>,
    from: String,
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        recipients: Vec<String>,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::InvalidConfig(format!("smtp relay {smtp_host}: {e}")))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: Box::new(builder.build()),
            from: from.to_string(),
            recipients,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_transport(
        transport: Box<dyn MailTransport>,
        from: &str,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            transport,
            from: from.to_string(),
            recipients,
        }
    }

    fn format_subject(alert: &AlertEvent) -> String {
        format!(
            "[domwatch][{}] {} - {}",
            alert.severity, alert.category, alert.domain_name
        )
    }

    fn format_body(alert: &AlertEvent) -> String {
        let value_line = match alert.value {
            Some(days) => format!("\nDays remaining: {days}"),
            None => String::new(),
        };
        format!(
            "Alert: {severity}\nDomain: {domain}\nCategory: {category}{value_line}\nMessage: {message}\nTime: {time}",
            severity = alert.severity,
            domain = alert.domain_name,
            category = alert.category,
            value_line = value_line,
            message = alert.message,
            time = alert.fired_at,
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &AlertEvent) -> Result<()> {
        let subject = Self::format_subject(alert);
        let body = Self::format_body(alert);

        // Failures are tracked per recipient: a later success must not
        // mask an earlier recipient's exhausted retries.
        let mut failed: Vec<String> = Vec::new();

        for recipient in &self.recipients {
            let email = Message::builder()
                .from(
                    self.from
                        .parse()
                        .map_err(|e| NotifyError::InvalidConfig(format!("from address: {e}")))?,
                )
                .to(recipient
                    .parse()
                    .map_err(|e| NotifyError::InvalidConfig(format!("recipient address: {e}")))?)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;

            let mut last_err = None;
            for attempt in 0..3u32 {
                match self.transport.deliver(email.clone()).await {
                    Ok(()) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            recipient = %recipient,
                            error = %e,
                            "Email send failed, retrying"
                        );
                        last_err = Some(e);
                        if attempt < 2 {
                            tokio::time::sleep(std::time::Duration::from_millis(
                                100 * 2u64.pow(attempt),
                            ))
                            .await;
                        }
                    }
                }
            }

            if let Some(e) = last_err {
                failed.push(format!("{recipient}: {e}"));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Smtp(format!(
                "delivery failed for {}",
                failed.join("; ")
            )))
        }
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}

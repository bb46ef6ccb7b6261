// Outbound email. Only login codes are sent today.
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::MailConfig;
use crate::models::Role;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API rejected the message with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn otp(to: &str, role: Role, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your login code".to_string(),
            body: format!(
                "Your {} login code is {}. It expires in {} minutes. If you did not request it, ignore this email.",
                role, code, ttl_minutes
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Posts messages as JSON to a transactional mail API
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&OutboundMail {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                text: &message.body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::debug!("Sent '{}' to {}", message.subject, message.to);
        Ok(())
    }
}

/// Development mailer: writes the message to the log instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!("[mail] to={} subject={:?} body={:?}", message.to, message.subject, message.body);
        Ok(())
    }
}

/// Use the HTTP mailer when an API is configured, otherwise log.
/// Configuration validation already requires the API outside development.
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match (&config.api_url, &config.api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailer::new(url.clone(), key.clone(), config.from.clone())),
        _ => {
            tracing::warn!("MAIL_API_URL not set, login codes will be written to the log");
            Arc::new(LogMailer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_message_carries_code_and_expiry() {
        let message = MailMessage::otp("sam@example.com", Role::Employee, "042917", 10);
        assert_eq!(message.to, "sam@example.com");
        assert!(message.body.contains("042917"));
        assert!(message.body.contains("employee"));
        assert!(message.body.contains("10 minutes"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let message = MailMessage::otp("sam@example.com", Role::User, "123456", 5);
        assert!(LogMailer.send(message).await.is_ok());
    }
}

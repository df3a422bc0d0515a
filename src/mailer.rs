// src/mailer.rs

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

use crate::config::MailConfig;
use crate::models::User;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound transactional mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Writes mail to the log instead of delivering it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!(
            target: "mail",
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "outgoing mail"
        );
        Ok(())
    }
}

/// Keeps sent mail in memory
#[derive(Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::Delivery("outbox lock poisoned".into()))?
            .push(message);
        Ok(())
    }
}

pub fn welcome_message(config: &MailConfig, user: &User) -> MailMessage {
    MailMessage {
        from: config.from.clone(),
        to: user.email.clone(),
        subject: "Welcome to dashdesk".to_string(),
        body: format!(
            "Hi {},\n\nYour account is ready. Sign in at {}/login\n",
            user.name, config.app_url
        ),
    }
}

pub fn password_reset_message(
    config: &MailConfig,
    user: &User,
    raw_token: &str,
    ttl_minutes: i64,
) -> MailMessage {
    MailMessage {
        from: config.from.clone(),
        to: user.email.clone(),
        subject: "Reset your dashdesk password".to_string(),
        body: format!(
            "Hi {},\n\n\
             Use the link below to choose a new password. It expires in {} minutes.\n\n\
             {}/reset-password?token={}\n\n\
             If you did not ask for this, ignore this mail.\n",
            user.name, ttl_minutes, config.app_url, raw_token
        ),
    }
}

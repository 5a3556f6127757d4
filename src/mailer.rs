use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;
use crate::error::MailError;

/// Sends a plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// STARTTLS relay to `config.smtp_host`, authenticating when
    /// credentials are given.
    pub fn new(config: &MailConfig, credentials: Option<(String, String)>) -> Result<Self, MailError> {
        let from: Mailbox = config.from.parse()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    pub fn build_message(
        from: &Mailbox,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<Message, MailError> {
        let message = Message::builder()
            .from(from.clone())
            .to(to.trim().parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = Self::build_message(&self.from, to, subject, body)?;
        self.transport.send(message).await?;
        info!("Sent '{}' to {}", subject, to);
        Ok(())
    }
}

/// Used when `[mail] enabled = false`; every send fails.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
        Err(MailError::Disabled)
    }
}

//! SMTP notifier built on lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox as Address;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use super::config::SmtpConfig;
use super::error::NotifyError;
use super::traits::Notifier;

/// Sends plain-text mail through an authenticated relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Address,
    to: Vec<Address>,
}

impl SmtpNotifier {
    /// Addresses are checked before the transport exists. The transport
    /// must be created and dropped inside a Tokio runtime.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let (from, to) = addresses(config)?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let builder = self.to.iter().fold(
            Message::builder()
                .from(self.from.clone())
                .subject(subject)
                .header(ContentType::TEXT_PLAIN),
            |b, addr| b.to(addr.clone()),
        );
        builder
            .body(body.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

/// Sender (falling back to the login) and recipients.
fn addresses(config: &SmtpConfig) -> Result<(Address, Vec<Address>), NotifyError> {
    let from_raw = config.from.as_deref().unwrap_or(&config.username);
    let from = from_raw
        .parse::<Address>()
        .map_err(|e| NotifyError::invalid_address(from_raw, e))?;

    if config.to.is_empty() {
        return Err(NotifyError::invalid_address("", "no recipients configured"));
    }
    let to = config
        .to
        .iter()
        .map(|a| a.parse::<Address>().map_err(|e| NotifyError::invalid_address(a, e)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((from, to))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.build_message(subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        debug!(subject, recipients = self.to.len(), "Notification sent");
        Ok(())
    }
}

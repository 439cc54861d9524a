//! SMTP submission over implicit TLS using lettre.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use super::{Mailer, OutgoingEmail, SendError};
use crate::campaign::SenderIdentity;
use crate::config::SmtpSettings;

/// Pooled SMTP transport authenticated as the campaign sender.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a transport for `settings`, logging in as `sender`.
    ///
    /// No connection is opened until the first message is sent.
    pub fn new(settings: &SmtpSettings, sender: &SenderIdentity) -> Result<Self, SendError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| SendError::Transport(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                sender.address().to_string(),
                sender.secret().to_string(),
            ))
            .timeout(Some(settings.send_timeout))
            .build();

        info!(
            smtp_host = %settings.host,
            smtp_port = settings.port,
            sender = %sender.address(),
            "smtp_transport_created"
        );

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError> {
        let message = build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        debug!(
            to = %email.to,
            smtp_code = %response.code(),
            "smtp_message_accepted"
        );

        Ok(())
    }
}

/// Build the MIME message for an outgoing email (single `text/html` part).
pub fn build_message(email: &OutgoingEmail) -> Result<Message, SendError> {
    let from = parse_mailbox(&email.from)?;
    let to = parse_mailbox(&email.to)?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .map_err(|e| SendError::Message(e.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| SendError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

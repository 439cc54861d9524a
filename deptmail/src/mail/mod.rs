//! Outbound mail seam.
//!
//! The dispatcher only knows the [`Mailer`] trait; [`SmtpMailer`] is the
//! production implementation.

pub mod smtp;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use smtp::{build_message, SmtpMailer};

/// A fully rendered message ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Sender mailbox
    pub from: String,
    /// Recipient mailbox
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Personalized HTML body
    pub html: String,
}

/// Why a single message could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("could not build message: {0}")]
    Message(String),

    #[error("smtp transport error: {0}")]
    Transport(String),

    #[error("send timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Anything that can submit a single email.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Submit one message. One attempt, no retries.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError>;
}

//! Campaign definition, dispatch and reporting.
//!
//! ## Flow
//!
//! ```text
//! Campaign + [RecipientRecord] → Dispatcher::run() → CampaignReport
//! ```

pub mod dispatcher;
pub mod report;

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::recipients::GroupFilter;

pub use dispatcher::Dispatcher;
pub use report::{CampaignReport, SendOutcome};

/// Where the HTML body of a campaign comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    /// HTML template read from a file
    TemplateFile(PathBuf),
    /// HTML given inline on the command line
    Literal(String),
}

/// Errors raised while loading a campaign body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Body file '{}' does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("Body file '{}' could not be read: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BodySource {
    /// Load the template text.
    pub fn load(&self) -> Result<String, BodyError> {
        match self {
            BodySource::Literal(html) => Ok(html.clone()),
            BodySource::TemplateFile(path) => fs::read_to_string(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => BodyError::NotFound { path: path.clone() },
                _ => BodyError::Read {
                    path: path.clone(),
                    source: e,
                },
            }),
        }
    }
}

/// Sender mailbox and its SMTP credential.
///
/// The credential never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    address: String,
    secret: String,
}

impl SenderIdentity {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderIdentity")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// One bulk send: who it goes to and what it says.
#[derive(Debug, Clone)]
pub struct Campaign {
    /// Subject line shared by every message
    pub subject: String,
    /// HTML template, personalized per recipient
    pub body: BodySource,
    /// Cohort of the recipient table to target
    pub filter: GroupFilter,
    /// Mailbox the campaign is sent from
    pub sender: SenderIdentity,
    /// Open-tracking pixel embedded into the body, when tracking is enabled
    pub tracking_pixel_url: Option<Url>,
}

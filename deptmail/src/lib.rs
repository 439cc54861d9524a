//! Deptmail - department-filtered bulk HTML mailer with open tracking.
//!
//! This library provides shared modules for the two binaries:
//! - `deptmail`: CLI that validates, selects, personalizes and sends a campaign
//! - `deptmail-tracker`: web server counting opens behind a tracking pixel
//!
//! ## Architecture
//!
//! ```text
//! CSV + template → validate → select_recipients → render → Dispatcher → SMTP
//!                                                                         ↓
//! deptmail view-count → GET /count ← Tracker ← GET /open.png ← mail client
//! ```

pub mod campaign;
pub mod cli;
pub mod config;
pub mod mail;
pub mod recipients;
pub mod template;
pub mod tracker;
pub mod validate;

// Re-export commonly used types
pub use campaign::{BodySource, Campaign, CampaignReport, Dispatcher, SendOutcome, SenderIdentity};
pub use config::{ConfigError, SmtpSettings, TrackerConfig};
pub use mail::{Mailer, OutgoingEmail, SendError, SmtpMailer};
pub use recipients::{select_recipients, GroupFilter, RecipientRecord, RecipientTable};
pub use tracker::{CounterStore, StorageError, TrackerResponse, TrackerState};
pub use validate::{validate, ValidationIssue, ValidationResult};

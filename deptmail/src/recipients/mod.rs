//! Recipient table loading and cohort selection.
//!
//! ## Flow
//!
//! ```text
//! CSV file → RecipientTable → select_recipients(filter) → Vec<RecipientRecord>
//! ```

pub mod selector;
pub mod table;

use std::fmt;

pub use selector::select_recipients;
pub use table::{RecipientTable, TableError, EMAIL_COLUMN, GROUP_COLUMN, NAME_COLUMN, REQUIRED_COLUMNS};

/// A single recipient taken from one row of the recipient table.
///
/// All fields are trimmed. Records are only ever built by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRecord {
    /// Recipient email address
    pub email: String,
    /// Display name used for personalization
    pub name: String,
    /// Department/group code the recipient belongs to
    pub group_code: String,
}

impl RecipientRecord {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        group_code: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            group_code: group_code.into(),
        }
    }
}

/// Which cohort of the recipient table a campaign targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupFilter {
    /// Every recipient with a non-empty group code
    All,
    /// Recipients whose trimmed group code equals this value exactly
    Code(String),
}

impl GroupFilter {
    /// Parse a filter argument. `all` is matched case-insensitively; any
    /// other value is a literal (trimmed) group code.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            GroupFilter::All
        } else {
            GroupFilter::Code(trimmed.to_string())
        }
    }

    /// Whether a (trimmed) group code belongs to this cohort.
    pub fn matches(&self, group_code: &str) -> bool {
        match self {
            GroupFilter::All => !group_code.is_empty(),
            GroupFilter::Code(code) => group_code == code,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, GroupFilter::All)
    }
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupFilter::All => f.write_str("all"),
            GroupFilter::Code(code) => f.write_str(code),
        }
    }
}

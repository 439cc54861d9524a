//! Pre-flight validation of a campaign.
//!
//! Every check runs, and every problem found is reported. Nothing is sent
//! unless the resulting [`ValidationResult`] is empty.
//!
//! Row numbers start at 2 (the header is row 1) and advance only past rows
//! with the expected number of fields, so a malformed row shares its number
//! with the row that follows it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::campaign::{BodyError, BodySource};
use crate::recipients::{
    GroupFilter, RecipientTable, TableError, EMAIL_COLUMN, GROUP_COLUMN, NAME_COLUMN,
};

/// Accepted email address shape.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Minimum number of characters in a recipient name.
pub const MIN_NAME_LENGTH: usize = 2;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("Invalid email pattern"));

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("Recipient file '{}' does not exist", .path.display())]
    MissingFile { path: PathBuf },

    #[error("Recipient file '{}' could not be read: {reason}", .path.display())]
    UnreadableTable { path: PathBuf, reason: String },

    #[error("Recipient file is empty")]
    EmptyTable,

    #[error("Missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Recipient file contains no data rows")]
    NoDataRows,

    #[error("Row {row}: Invalid number of columns")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row}: Empty email address")]
    EmptyEmail { row: usize },

    #[error("Row {row}: Invalid email format - {value}")]
    InvalidEmail { row: usize, value: String },

    #[error("Row {row}: Empty name")]
    EmptyName { row: usize },

    #[error("Row {row}: Name too short - {value}")]
    InvalidName { row: usize, value: String },

    #[error("Row {row}: Empty department code")]
    MissingGroupCode { row: usize },

    #[error("Body file '{}' does not exist", .path.display())]
    MissingTemplate { path: PathBuf },

    #[error("Body file '{}' could not be read: {reason}", .path.display())]
    UnreadableTemplate { path: PathBuf, reason: String },

    #[error("{}", empty_template_message(.path))]
    EmptyTemplate { path: Option<PathBuf> },

    #[error("Subject cannot be empty")]
    EmptySubject,

    #[error("Invalid department code '{code}'. Available departments are: {}", .known.join(", "))]
    UnknownGroupCode { code: String, known: Vec<String> },
}

impl ValidationIssue {
    /// Table row the issue refers to, for row-level issues.
    pub fn row(&self) -> Option<usize> {
        match self {
            ValidationIssue::MalformedRow { row, .. }
            | ValidationIssue::EmptyEmail { row }
            | ValidationIssue::InvalidEmail { row, .. }
            | ValidationIssue::EmptyName { row }
            | ValidationIssue::InvalidName { row, .. }
            | ValidationIssue::MissingGroupCode { row } => Some(*row),
            _ => None,
        }
    }
}

fn empty_template_message(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("Body file '{}' is empty", path.display()),
        None => "Email body is empty".to_string(),
    }
}

/// Outcome of validating a campaign: every issue found, in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One human-readable line per issue.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Check whether `email` has an acceptable address shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Validate a campaign straight from its inputs.
pub fn validate(
    recipients: &Path,
    body: &BodySource,
    subject: &str,
    filter: &GroupFilter,
) -> ValidationResult {
    let table = RecipientTable::from_path(recipients);
    let template = body.load();
    validate_loaded(&table, body, &template, subject, filter)
}

/// Validate already-loaded inputs.
///
/// Lets the caller read the table and template once and reuse them for
/// selection and rendering.
pub fn validate_loaded(
    table: &Result<RecipientTable, TableError>,
    body: &BodySource,
    template: &Result<String, BodyError>,
    subject: &str,
    filter: &GroupFilter,
) -> ValidationResult {
    let mut errors = Vec::new();

    match table {
        Ok(table) => errors.extend(check_table(table)),
        Err(e) => errors.push(table_error_issue(e)),
    }

    if subject.trim().is_empty() {
        errors.push(ValidationIssue::EmptySubject);
    }

    errors.extend(check_template(body, template));

    if let Ok(table) = table {
        errors.extend(check_group_filter(table, filter));
    }

    let result = ValidationResult { errors };

    if result.is_valid() {
        info!(filter = %filter, "validation_passed");
    } else {
        warn!(
            filter = %filter,
            error_count = result.errors.len(),
            "validation_failed"
        );
    }

    result
}

fn table_error_issue(error: &TableError) -> ValidationIssue {
    match error {
        TableError::NotFound { path } => ValidationIssue::MissingFile { path: path.clone() },
        TableError::Read { path, source } => ValidationIssue::UnreadableTable {
            path: path.clone(),
            reason: source.to_string(),
        },
    }
}

/// Structural and per-row checks of the recipient table.
fn check_table(table: &RecipientTable) -> Vec<ValidationIssue> {
    if table.is_headerless() {
        return vec![ValidationIssue::EmptyTable];
    }

    let missing = table.missing_columns();
    if !missing.is_empty() {
        return vec![ValidationIssue::MissingColumns {
            columns: missing.into_iter().map(str::to_string).collect(),
        }];
    }

    if table.rows().is_empty() {
        return vec![ValidationIssue::NoDataRows];
    }

    let (Some(email_idx), Some(name_idx), Some(group_idx)) = (
        table.column_index(EMAIL_COLUMN),
        table.column_index(NAME_COLUMN),
        table.column_index(GROUP_COLUMN),
    ) else {
        return Vec::new();
    };

    let expected = table.headers().len();
    let mut errors = Vec::new();
    let mut row = 2;

    for fields in table.rows() {
        if fields.len() != expected {
            errors.push(ValidationIssue::MalformedRow {
                row,
                expected,
                found: fields.len(),
            });
            continue;
        }

        let email = fields[email_idx].trim();
        if email.is_empty() {
            errors.push(ValidationIssue::EmptyEmail { row });
        } else if !is_valid_email(email) {
            errors.push(ValidationIssue::InvalidEmail {
                row,
                value: email.to_string(),
            });
        }

        let name = fields[name_idx].trim();
        if name.is_empty() {
            errors.push(ValidationIssue::EmptyName { row });
        } else if name.chars().count() < MIN_NAME_LENGTH {
            errors.push(ValidationIssue::InvalidName {
                row,
                value: name.to_string(),
            });
        }

        if fields[group_idx].trim().is_empty() {
            errors.push(ValidationIssue::MissingGroupCode { row });
        }

        row += 1;
    }

    errors
}

fn check_template(
    body: &BodySource,
    template: &Result<String, BodyError>,
) -> Option<ValidationIssue> {
    match template {
        Err(BodyError::NotFound { path }) => {
            Some(ValidationIssue::MissingTemplate { path: path.clone() })
        }
        Err(BodyError::Read { path, source }) => Some(ValidationIssue::UnreadableTemplate {
            path: path.clone(),
            reason: source.to_string(),
        }),
        Ok(content) if content.trim().is_empty() => Some(ValidationIssue::EmptyTemplate {
            path: match body {
                BodySource::TemplateFile(path) => Some(path.clone()),
                BodySource::Literal(_) => None,
            },
        }),
        Ok(_) => None,
    }
}

/// A specific group code must exist in the table. Skipped when the table
/// yields no codes at all, since the table checks already explain why.
fn check_group_filter(table: &RecipientTable, filter: &GroupFilter) -> Option<ValidationIssue> {
    let GroupFilter::Code(code) = filter else {
        return None;
    };

    let known = table.group_codes();
    if known.is_empty() || known.contains(code) {
        return None;
    }

    Some(ValidationIssue::UnknownGroupCode {
        code: code.clone(),
        known: known.into_iter().collect(),
    })
}

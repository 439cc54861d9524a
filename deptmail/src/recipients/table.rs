//! CSV recipient table reader.
//!
//! The table is read in one pass with a flexible field count, so rows with
//! too few or too many columns are kept and reported by the validator rather
//! than aborting the read. Header names are normalized (trimmed, lowercase).

use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;
use tracing::debug;

/// Column holding the recipient email address.
pub const EMAIL_COLUMN: &str = "email";

/// Column holding the recipient display name.
pub const NAME_COLUMN: &str = "name";

/// Column holding the department/group code.
pub const GROUP_COLUMN: &str = "department_code";

/// Columns every recipient table must declare, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 3] = [EMAIL_COLUMN, NAME_COLUMN, GROUP_COLUMN];

/// Errors raised while reading a recipient table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Recipient file '{}' does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("Recipient file '{}' could not be read: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Raw recipient table: a normalized header plus every data row as read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecipientTable {
    /// Read a recipient table from a CSV file.
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TableError::NotFound {
                path: path.to_path_buf(),
            },
            _ => TableError::Read {
                path: path.to_path_buf(),
                source: csv::Error::from(e),
            },
        })?;

        Self::from_reader(file).map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a recipient table from any CSV source.
    ///
    /// The first record is the header. Blank lines are skipped.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = reader.records();

        let headers = match records.next() {
            Some(header) => header?
                .iter()
                .map(|column| column.trim().to_lowercase())
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for record in records {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        debug!(columns = ?headers, row_count = rows.len(), "recipient_table_read");

        Ok(Self { headers, rows })
    }

    /// Normalized header names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows in source order (header excluded).
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// True when the table has no header at all.
    pub fn is_headerless(&self) -> bool {
        self.headers.iter().all(|h| h.is_empty())
    }

    /// Position of a (normalized) column name in the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Required columns absent from the header, in reporting order.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| self.column_index(column).is_none())
            .collect()
    }

    /// Distinct trimmed, non-empty group codes, sorted.
    pub fn group_codes(&self) -> BTreeSet<String> {
        let Some(idx) = self.column_index(GROUP_COLUMN) else {
            return BTreeSet::new();
        };

        self.rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect()
    }
}

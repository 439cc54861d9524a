//! Cohort selection over a recipient table.

use tracing::{debug, info};

use super::table::{RecipientTable, EMAIL_COLUMN, GROUP_COLUMN, NAME_COLUMN};
use super::{GroupFilter, RecipientRecord};

/// Select the recipients matching `filter`, in source order.
///
/// Fields are trimmed before matching and before being copied into the
/// record. Rows lacking any of the required fields are skipped, and a table
/// without the required columns selects nobody.
pub fn select_recipients(table: &RecipientTable, filter: &GroupFilter) -> Vec<RecipientRecord> {
    let (Some(email_idx), Some(name_idx), Some(group_idx)) = (
        table.column_index(EMAIL_COLUMN),
        table.column_index(NAME_COLUMN),
        table.column_index(GROUP_COLUMN),
    ) else {
        debug!("recipient_select_missing_columns");
        return Vec::new();
    };

    let recipients: Vec<RecipientRecord> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let email = row.get(email_idx)?.trim();
            let name = row.get(name_idx)?.trim();
            let group_code = row.get(group_idx)?.trim();

            filter
                .matches(group_code)
                .then(|| RecipientRecord::new(email, name, group_code))
        })
        .collect();

    info!(
        filter = %filter,
        rows = table.rows().len(),
        selected = recipients.len(),
        "recipients_selected"
    );

    recipients
}

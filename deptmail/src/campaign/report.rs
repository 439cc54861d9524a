//! Per-recipient outcomes and the end-of-run report.

use std::collections::BTreeMap;
use std::fmt;

use crate::mail::SendError;
use crate::recipients::{GroupFilter, RecipientRecord};

const RULE: &str = "----------------------------------------";

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub recipient: RecipientRecord,
    pub success: bool,
    /// Failure cause, for unsuccessful attempts
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn new(recipient: RecipientRecord, result: &Result<(), SendError>) -> Self {
        Self {
            recipient,
            success: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

/// Aggregated outcome of a campaign run.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    filter: GroupFilter,
    outcomes: Vec<SendOutcome>,
}

impl CampaignReport {
    pub fn new(filter: GroupFilter) -> Self {
        Self {
            filter,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: SendOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn filter(&self) -> &GroupFilter {
        &self.filter
    }

    /// Outcomes in dispatch order.
    pub fn outcomes(&self) -> &[SendOutcome] {
        &self.outcomes
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Successful sends per group code. Groups without a success are absent.
    pub fn sent_by_group(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in self.outcomes.iter().filter(|o| o.success) {
            *counts.entry(outcome.recipient.group_code.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Rows of the printed report: one per group for `all`, otherwise a
    /// single aggregate row for the requested code.
    pub fn summary_rows(&self) -> Vec<(String, usize)> {
        match &self.filter {
            GroupFilter::All => self.sent_by_group().into_iter().collect(),
            GroupFilter::Code(code) => vec![(code.clone(), self.succeeded())],
        }
    }
}

impl fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Email Send Report")?;
        writeln!(f, "{RULE}")?;
        for (code, count) in self.summary_rows() {
            writeln!(f, "Department: {code}, Emails Sent: {count}")?;
        }
        writeln!(f, "{RULE}")?;
        write!(
            f,
            "Attempted: {}, Succeeded: {}, Failed: {}",
            self.attempted(),
            self.succeeded(),
            self.failed()
        )
    }
}

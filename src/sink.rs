use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::integration::Store;
use crate::notify::{dispatch, html_table, Notification, Notifier};
use crate::pipeline::ProcessedBatch;

/// Columns of the late-contribution summary email.
pub const LATE_SUMMARY_COLUMNS: &[&str] = &[
    "committee_name",
    "fec_committee_id",
    "candidate_name",
    "fec_candidate_id",
    "office",
    "state",
    "district",
    "amount",
    "contribution_date",
    "receipt_date",
    "contributor_organization_name",
    "html_url",
];

/// Where and how to announce a commit.
pub struct Notice<'a> {
    pub notifier: &'a dyn Notifier,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
}

impl<'a> Notice<'a> {
    pub fn send(&self, columns: &[&str], rows: &[Value]) -> bool {
        let notification = Notification {
            subject: self.subject.clone(),
            html_body: html_table(columns, rows),
            from: self.from.clone(),
            to: self.to.clone(),
        };
        dispatch(self.notifier, &notification)
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct CommitReport {
    pub late_contributions: usize,
    pub committees: usize,
    pub candidates: usize,
    pub notified: bool,
}

/// Appends the ledger rows, then the new committee names, then the new candidates.
///
/// There is no transaction across the three tables: the first failing append is returned
/// and whatever was written before it stays written.
pub fn commit(store: &mut dyn Store, batch: &ProcessedBatch, notice: Option<Notice>) -> Result<CommitReport, StoreError> {
    let mut report = CommitReport::default();

    report.late_contributions = store.append_late_contributions(&batch.records)?;
    report.committees = store.append_committee_names(&batch.new_committees)?;
    report.candidates = store.append_candidate_infos(&batch.new_candidates)?;

    info!(
        late_contributions = report.late_contributions,
        committees = report.committees,
        candidates = report.candidates,
        "committed late contributions"
    );

    if let Some(notice) = notice {
        if batch.records.is_empty() {
            info!("nothing new, no email sent");
        } else {
            let rows: Vec<Value> = batch.records.iter().filter_map(|r| serde_json::to_value(r).ok()).collect();
            report.notified = notice.send(LATE_SUMMARY_COLUMNS, &rows);
            if !report.notified {
                warn!(records = rows.len(), "late contributions were stored but the email failed");
            }
        }
    }

    Ok(report)
}

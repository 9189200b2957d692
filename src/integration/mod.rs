use std::collections::HashSet;

use serde_json::Value;

pub mod postgres;

#[cfg(test)]
pub mod memory;

use crate::cache::TransactionRef;
use crate::common::{CandidateEntry, CommitteeEntry, ContributionRecord, FilingKey};
use crate::error::StoreError;

/// The relational tables the tracker reads its reference data from and appends results to.
///
/// Appends never overwrite: a row whose key already exists is left as it was.
pub trait Store {
    fn committee_names(&mut self) -> Result<Vec<CommitteeEntry>, StoreError>;
    fn candidate_infos(&mut self) -> Result<Vec<CandidateEntry>, StoreError>;
    fn seen_late_contributions(&mut self) -> Result<Vec<FilingKey>, StoreError>;
    fn transaction_references(&mut self) -> Result<Vec<TransactionRef>, StoreError>;
    fn independent_expenditure_ids(&mut self) -> Result<HashSet<String>, StoreError>;

    fn append_late_contributions(&mut self, records: &[ContributionRecord]) -> Result<usize, StoreError>;
    fn append_committee_names(&mut self, entries: &[CommitteeEntry]) -> Result<usize, StoreError>;
    fn append_candidate_infos(&mut self, entries: &[CandidateEntry]) -> Result<usize, StoreError>;
    fn append_independent_expenditures(&mut self, rows: &[Value]) -> Result<usize, StoreError>;
}

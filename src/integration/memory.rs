use std::collections::HashSet;

use serde_json::Value;

use super::Store;
use crate::cache::TransactionRef;
use crate::common::{text_field, CandidateEntry, CommitteeEntry, ContributionRecord, FilingKey};
use crate::error::StoreError;

pub const LATE_CONTRIBUTIONS: &str = "late_contributions";
pub const COMMITTEE_NAMES: &str = "pac_names";
pub const CANDIDATE_INFO: &str = "candidate_info";
pub const INDEPENDENT_EXPENDITURES: &str = "fiu_pp";

/// In-process stand-in for the Postgres tables. `failing_table` makes every append to that
/// table fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub committees: Vec<CommitteeEntry>,
    pub candidates: Vec<CandidateEntry>,
    pub seen: Vec<FilingKey>,
    pub late_contributions: Vec<ContributionRecord>,
    pub transactions: Vec<TransactionRef>,
    pub independent_expenditures: Vec<Value>,
    pub failing_table: Option<&'static str>,
}

impl MemoryStore {
    fn check(&self, table: &str) -> Result<(), StoreError> {
        match self.failing_table {
            Some(t) if t == table => Err(StoreError::Unavailable(format!("{} is read-only", table))),
            _ => Ok(()),
        }
    }
}

impl Store for MemoryStore {
    fn committee_names(&mut self) -> Result<Vec<CommitteeEntry>, StoreError> {
        Ok(self.committees.clone())
    }

    fn candidate_infos(&mut self) -> Result<Vec<CandidateEntry>, StoreError> {
        Ok(self.candidates.clone())
    }

    fn seen_late_contributions(&mut self) -> Result<Vec<FilingKey>, StoreError> {
        let mut keys = self.seen.clone();
        keys.extend(self.late_contributions.iter().map(|r| r.key()));
        Ok(keys)
    }

    fn transaction_references(&mut self) -> Result<Vec<TransactionRef>, StoreError> {
        Ok(self.transactions.clone())
    }

    fn independent_expenditure_ids(&mut self) -> Result<HashSet<String>, StoreError> {
        Ok(self.independent_expenditures.iter().filter_map(|r| text_field(r, "unique_id")).collect())
    }

    fn append_late_contributions(&mut self, records: &[ContributionRecord]) -> Result<usize, StoreError> {
        self.check(LATE_CONTRIBUTIONS)?;
        let existing: HashSet<FilingKey> = self.seen_late_contributions()?.into_iter().collect();
        let fresh: Vec<ContributionRecord> = records.iter().filter(|r| !existing.contains(&r.key())).cloned().collect();
        self.late_contributions.extend(fresh.iter().cloned());
        Ok(fresh.len())
    }

    fn append_committee_names(&mut self, entries: &[CommitteeEntry]) -> Result<usize, StoreError> {
        self.check(COMMITTEE_NAMES)?;
        let mut added = 0;
        for entry in entries {
            if !self.committees.iter().any(|c| c.committee_id == entry.committee_id) {
                self.committees.push(entry.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    fn append_candidate_infos(&mut self, entries: &[CandidateEntry]) -> Result<usize, StoreError> {
        self.check(CANDIDATE_INFO)?;
        let mut added = 0;
        for entry in entries {
            if !self.candidates.iter().any(|c| c.candidate_id == entry.candidate_id) {
                self.candidates.push(entry.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    fn append_independent_expenditures(&mut self, rows: &[Value]) -> Result<usize, StoreError> {
        self.check(INDEPENDENT_EXPENDITURES)?;
        self.independent_expenditures.extend(rows.iter().cloned());
        Ok(rows.len())
    }
}

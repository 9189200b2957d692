use std::collections::{HashMap, HashSet};

use crate::common::{CandidateEntry, CandidateInfo, CommitteeEntry, FilingKey, CANDIDATE_NAME_PLACEHOLDER};
use crate::error::StoreError;
use crate::integration::Store;

/// One row of the independent-expenditure table, reduced to the columns used for name lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionRef {
    pub fec_candidate_id: Option<String>,
    pub candidate_name: Option<String>,
    pub office: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub fec_committee_id: Option<String>,
    pub fec_committee_name: Option<String>,
}

/// Snapshot of the reference tables taken at the start of a run.
///
/// Nothing here is written back during the run; callers collect new entries and persist them
/// once. When the same id appears more than once in a source table the first row wins.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    committees: HashMap<String, String>,
    candidates: HashMap<String, CandidateInfo>,
    seen: HashSet<FilingKey>,
    transaction_committees: HashMap<String, String>,
    transaction_candidates: HashMap<String, CandidateInfo>,
}

impl ReferenceCache {
    pub fn load(store: &mut dyn Store) -> Result<ReferenceCache, StoreError> {
        let committees = store.committee_names()?;
        let candidates = store.candidate_infos()?;
        let seen = store.seen_late_contributions()?;
        let transactions = store.transaction_references()?;

        let cache = ReferenceCache::from_parts(committees, candidates, seen, transactions);
        tracing::info!(
            committees = cache.committees.len(),
            candidates = cache.candidates.len(),
            seen = cache.seen.len(),
            "reference cache loaded"
        );
        Ok(cache)
    }

    pub fn from_parts(
        committees: Vec<CommitteeEntry>,
        candidates: Vec<CandidateEntry>,
        seen: Vec<FilingKey>,
        transactions: Vec<TransactionRef>,
    ) -> ReferenceCache {
        let mut cache = ReferenceCache::default();

        for entry in committees {
            cache.committees.entry(entry.committee_id).or_insert(entry.committee_name);
        }
        for entry in candidates {
            cache.candidates.entry(entry.candidate_id).or_insert(entry.info);
        }
        cache.seen.extend(seen);

        for row in transactions {
            let TransactionRef { fec_candidate_id, candidate_name, office, state, district, fec_committee_id, fec_committee_name } = row;

            if let (Some(id), Some(name)) = (fec_committee_id, fec_committee_name) {
                cache.transaction_committees.entry(id).or_insert(name);
            }
            if let Some(id) = fec_candidate_id {
                cache.transaction_candidates.entry(id).or_insert(CandidateInfo {
                    candidate_name: candidate_name.unwrap_or_else(|| CANDIDATE_NAME_PLACEHOLDER.to_owned()),
                    office,
                    state,
                    district,
                });
            }
        }

        cache
    }

    pub fn committee_name(&self, committee_id: &str) -> Option<&str> {
        self.committees.get(committee_id).map(|n| n.as_str())
    }

    pub fn candidate(&self, candidate_id: &str) -> Option<&CandidateInfo> {
        self.candidates.get(candidate_id)
    }

    pub fn transaction_committee_name(&self, committee_id: &str) -> Option<&str> {
        self.transaction_committees.get(committee_id).map(|n| n.as_str())
    }

    pub fn transaction_candidate(&self, candidate_id: &str) -> Option<&CandidateInfo> {
        self.transaction_candidates.get(candidate_id)
    }

    pub fn has_seen(&self, key: &FilingKey) -> bool {
        self.seen.contains(key)
    }
}

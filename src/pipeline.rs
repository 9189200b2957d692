use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::ReferenceCache;
use crate::common::{CandidateEntry, CandidateInfo, CommitteeEntry, ContributionRecord, FilingKey};
use crate::resolver::Resolver;
use crate::sources::propublica::document_url;
use crate::sources::EntitySource;

/// Output of one dedup pass: records ready for the ledger plus the reference entries the
/// caches did not have yet, each id at most once.
#[derive(Debug, Default)]
pub struct ProcessedBatch {
    pub records: Vec<ContributionRecord>,
    pub new_committees: Vec<CommitteeEntry>,
    pub new_candidates: Vec<CandidateEntry>,
}

/// Keeps PAC contributions whose (filing, transaction) pair has not been seen, in input order.
/// A pair repeated within the batch is kept once.
pub fn select_unseen_pac(raw: Vec<Value>, cache: &ReferenceCache) -> Vec<ContributionRecord> {
    let mut batch_keys: HashSet<FilingKey> = HashSet::new();
    let mut selected = Vec::new();

    for value in raw {
        let record = match ContributionRecord::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping contribution that could not be read");
                continue;
            }
        };
        if !record.is_pac() {
            continue;
        }
        let key = record.key();
        if cache.has_seen(&key) || !batch_keys.insert(key) {
            continue;
        }
        selected.push(record);
    }
    selected
}

pub fn process(raw: Vec<Value>, cache: &ReferenceCache, source: &dyn EntitySource) -> ProcessedBatch {
    let resolver = Resolver::new(cache, source);
    let received = raw.len();
    let selected = select_unseen_pac(raw, resolver.cache());

    let mut batch = ProcessedBatch::default();
    // ids resolved during this pass, so repeats neither re-query nor re-queue
    let mut committees: HashMap<String, String> = HashMap::new();
    let mut candidates: HashMap<String, CandidateInfo> = HashMap::new();

    for mut record in selected {
        record.html_url = Some(document_url(&record.fec_committee_id, &record.fec_filing_id));

        let committee_id = record.fec_committee_id.clone();
        let committee_name = committees.entry(committee_id.clone()).or_insert_with(|| {
            let (name, is_new) = resolver.resolve_committee(&committee_id);
            if is_new {
                batch.new_committees.push(CommitteeEntry { committee_id: committee_id.clone(), committee_name: name.clone() });
            }
            name
        });
        record.committee_name = Some(committee_name.clone());

        if let Some(candidate_id) = record.fec_candidate_id.clone() {
            let info = candidates.entry(candidate_id.clone()).or_insert_with(|| {
                let (info, is_new) = resolver.resolve_candidate(&candidate_id);
                if is_new {
                    batch.new_candidates.push(CandidateEntry { candidate_id: candidate_id.clone(), info: info.clone() });
                }
                info
            });
            record.apply_candidate(info);
        }

        batch.records.push(record);
    }

    info!(
        received,
        enriched = batch.records.len(),
        new_committees = batch.new_committees.len(),
        new_candidates = batch.new_candidates.len(),
        "late contributions processed"
    );
    batch
}

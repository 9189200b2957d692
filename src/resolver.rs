use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::cache::ReferenceCache;
use crate::common::{CandidateInfo, COMMITTEE_NAME_MISSING, COMMITTEE_NAME_QUERY_ERROR};
use crate::sources::propublica::{candidate_path, committee_path};
use crate::sources::EntitySource;

/// Resolves committee and candidate ids to display values.
///
/// Lookups go committee/candidate cache, then the independent-expenditure snapshot, then the
/// remote API. The boolean returned alongside each value is true when the cache did not have
/// it, i.e. the caller should queue it for insertion. The resolver itself never writes.
pub struct Resolver<'a> {
    cache: &'a ReferenceCache,
    source: &'a dyn EntitySource,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a ReferenceCache, source: &'a dyn EntitySource) -> Resolver<'a> {
        Resolver { cache, source }
    }

    pub fn cache(&self) -> &ReferenceCache {
        self.cache
    }

    pub fn resolve_committee(&self, committee_id: &str) -> (String, bool) {
        if let Some(name) = self.cache.committee_name(committee_id) {
            return (name.to_owned(), false);
        }
        if let Some(name) = self.cache.transaction_committee_name(committee_id) {
            return (name.to_owned(), true);
        }

        let name = match self.source.fetch_entity(&committee_path(committee_id)) {
            Ok(payload) => committee_name_from_payload(&payload),
            Err(e) => {
                warn!(committee_id, error = %e, "committee lookup failed");
                COMMITTEE_NAME_QUERY_ERROR.to_owned()
            },
        };
        (name, true)
    }

    pub fn resolve_candidate(&self, candidate_id: &str) -> (CandidateInfo, bool) {
        if let Some(info) = self.cache.candidate(candidate_id) {
            return (info.clone(), false);
        }
        if let Some(info) = self.cache.transaction_candidate(candidate_id) {
            return (info.clone(), true);
        }

        let info = match self.source.fetch_entity(&candidate_path(candidate_id)) {
            Ok(payload) => candidate_info_from_payload(&payload).unwrap_or_else(|| {
                warn!(candidate_id, "candidate payload is missing its name or seat, using placeholder");
                CandidateInfo::unresolved()
            }),
            Err(e) => {
                warn!(candidate_id, error = %e, "candidate lookup failed, using placeholder");
                CandidateInfo::unresolved()
            },
        };
        (info, true)
    }
}

/// `results[0].name` of a committee lookup.
pub fn committee_name_from_payload(payload: &Value) -> String {
    match payload.pointer("/results/0") {
        Some(committee) => match committee.get("name").and_then(|n| n.as_str()) {
            Some(name) => name.to_owned(),
            None => COMMITTEE_NAME_MISSING.to_owned(),
        },
        None => COMMITTEE_NAME_QUERY_ERROR.to_owned(),
    }
}

/// Reads `display_name` and the seat path (`/seats/{state}/{office}/{district}.json`) of a
/// candidate lookup. None when either is absent or the seat path has the wrong shape.
pub fn candidate_info_from_payload(payload: &Value) -> Option<CandidateInfo> {
    let candidate = payload.pointer("/results/0")?;
    let (state, office, district) = parse_seat(candidate.get("district")?.as_str()?)?;
    let name = candidate.get("display_name")?.as_str()?;

    Some(CandidateInfo {
        candidate_name: name.to_owned(),
        office: Some(office),
        state: Some(state),
        district: Some(district),
    })
}

fn parse_seat(seat: &str) -> Option<(String, String, String)> {
    lazy_static! {
        static ref RE_SEAT: Regex = Regex::new(r"^[^/]*/[^/]*/(?P<state>[^/]*)/(?P<office>[^/]*)/(?P<district>[^/]*)$").unwrap();
    }

    let captures = RE_SEAT.captures(seat)?;
    let district = captures.name("district")?.as_str().replace(".json", "");
    Some((
        captures.name("state")?.as_str().to_owned(),
        captures.name("office")?.as_str().to_owned(),
        district,
    ))
}

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const PAC_ENTITY_TYPE: &str = "PAC";

pub const COMMITTEE_NAME_MISSING: &str = "NAME MISSING";
pub const COMMITTEE_NAME_QUERY_ERROR: &str = "NAME QUERY ERROR";
pub const CANDIDATE_NAME_PLACEHOLDER: &str = "QE";

/// Identity of a late-contribution row in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilingKey {
    pub filing_id: String,
    pub transaction_id: String,
}

impl FilingKey {
    pub fn new<S: Into<String>>(filing_id: S, transaction_id: S) -> FilingKey {
        FilingKey {
            filing_id: filing_id.into(),
            transaction_id: transaction_id.into(),
        }
    }
}

/// A single 24/48-hour contribution as returned by the aggregator API.
///
/// Only the fields the pipeline reads or writes are typed; everything else the API sends
/// rides along in `extra` and is persisted with the ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecord {
    #[serde(deserialize_with = "text")]
    pub fec_filing_id: String,
    #[serde(deserialize_with = "text")]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub entity_type: Option<String>,
    #[serde(deserialize_with = "text")]
    pub fec_committee_id: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub fec_candidate_id: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub contribution_date: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub receipt_date: Option<String>,

    // enrichment
    #[serde(default, deserialize_with = "optional_text")]
    pub committee_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub candidate_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub office: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub html_url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContributionRecord {
    pub fn from_value(value: Value) -> Result<ContributionRecord, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn key(&self) -> FilingKey {
        FilingKey::new(self.fec_filing_id.as_str(), self.transaction_id.as_str())
    }

    pub fn is_pac(&self) -> bool {
        self.entity_type.as_deref() == Some(PAC_ENTITY_TYPE)
    }

    pub fn apply_candidate(&mut self, info: &CandidateInfo) {
        self.candidate_name = Some(info.candidate_name.to_owned());
        self.office = info.office.clone();
        self.state = info.state.clone();
        self.district = info.district.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub candidate_name: String,
    pub office: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
}

impl CandidateInfo {
    /// Stand-in for a candidate whose details could not be resolved.
    pub fn unresolved() -> CandidateInfo {
        CandidateInfo {
            candidate_name: CANDIDATE_NAME_PLACEHOLDER.to_owned(),
            office: None,
            state: None,
            district: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeEntry {
    pub committee_id: String,
    pub committee_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub candidate_id: String,
    pub info: CandidateInfo,
}

/// Reads a field the APIs are inconsistent about typing (ids are sometimes numbers).
pub fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => Some(s.to_owned()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where D: Deserializer<'de> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number, found {}", other))),
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where D: Deserializer<'de> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected string or number, found {}", other))),
    }
}

use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use crate::cache::ReferenceCache;
use crate::common::text_field;
use crate::config::EmailConfig;
use crate::error::Result;
use crate::integration::Store;
use crate::notify::Notifier;
use crate::pipeline::process;
use crate::sink::{commit, Notice};
use crate::sources::propublica::{independent_expenditures_path, today_eastern, LateScope, DATE_FORMAT};
use crate::sources::{ApiClient, FetchOptions};

/// Columns of the independent-expenditure summary email.
pub const IE_SUMMARY_COLUMNS: &[&str] = &[
    "fec_committee_name",
    "fec_committee_id",
    "candidate_name",
    "office",
    "state",
    "district",
    "amount",
    "date",
    "date_received",
    "dissemination_date",
    "purpose",
    "payee",
    "support_or_oppose",
    "transaction_id",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LateOptions {
    /// Only compute the target URL; nothing is fetched or written.
    pub return_url: bool,
    pub notify: bool,
}

#[derive(Debug, Default, PartialEq)]
pub struct LateRunSummary {
    pub fetched: usize,
    pub enriched: usize,
    pub new_committees: usize,
    pub new_candidates: usize,
    pub notified: bool,
}

#[derive(Debug, PartialEq)]
pub enum LateOutcome {
    Url(String),
    Completed(LateRunSummary),
}

pub fn late_contributions_url(client: &ApiClient, scope: &LateScope) -> String {
    client.url_for(&scope.path(today_eastern()))
}

fn notice<'a, N: Notifier>(notifier: &'a Option<N>, email: &EmailConfig, notify: bool, subject: String) -> Option<Notice<'a>> {
    match notifier {
        Some(notifier) if notify => Some(Notice {
            notifier,
            subject,
            from: email.from.clone(),
            to: email.to.clone(),
        }),
        _ => None,
    }
}

/// Runs the aggregator syncs against one store.
pub struct Tracker<S: Store, N: Notifier> {
    client: ApiClient,
    store: S,
    notifier: Option<N>,
    email: EmailConfig,
    page_size: usize,
}

impl<S: Store, N: Notifier> Tracker<S, N> {
    pub fn new(client: ApiClient, store: S, notifier: Option<N>, email: EmailConfig, page_size: usize) -> Tracker<S, N> {
        Tracker { client, store, notifier, email, page_size }
    }

    /// Fetches one scope of 24/48-hour contributions and records the PAC ones not seen before.
    pub fn update_late_contributions(&mut self, scope: &LateScope, options: LateOptions) -> Result<LateOutcome> {
        let today = today_eastern();
        let path = scope.path(today);
        if options.return_url {
            return Ok(LateOutcome::Url(self.client.url_for(&path)));
        }

        let cache = ReferenceCache::load(&mut self.store)?;
        let fetch_options = FetchOptions { page_size: self.page_size, ..Default::default() };
        let raw = self.client.fetch(&path, &fetch_options)?;
        let fetched = raw.len();

        let batch = process(raw, &cache, &self.client);

        let day = match scope {
            LateScope::Date(date) => *date,
            _ => today,
        };
        let subject = format!("New Late Contributions for {}!", day.format(DATE_FORMAT));
        let notice = notice(&self.notifier, &self.email, options.notify, subject);
        let report = commit(&mut self.store, &batch, notice)?;

        let summary = LateRunSummary {
            fetched,
            enriched: batch.records.len(),
            new_committees: batch.new_committees.len(),
            new_candidates: batch.new_candidates.len(),
            notified: report.notified,
        };
        info!(
            path = path.as_str(),
            fetched = summary.fetched,
            enriched = summary.enriched,
            new_committees = summary.new_committees,
            new_candidates = summary.new_candidates,
            "late contribution run finished"
        );
        Ok(LateOutcome::Completed(summary))
    }

    /// Pulls the day's independent expenditures and appends the ones whose `unique_id` is new.
    ///
    /// Rows come back newest first, so paging stops at the first page with nothing new.
    pub fn update_daily_transactions(&mut self, date: Option<NaiveDate>, notify: bool) -> Result<Vec<Value>> {
        let date = date.unwrap_or_else(today_eastern);
        let path = independent_expenditures_path(date);

        let existing = self.store.independent_expenditure_ids()?;
        let is_new = |row: &Value| match text_field(row, "unique_id") {
            Some(id) => !existing.contains(&id),
            None => false,
        };
        let options = FetchOptions { page_size: self.page_size, filter: Some(&is_new), ..Default::default() };
        let rows = self.client.fetch(&path, &options)?;

        if rows.is_empty() {
            info!(path = path.as_str(), "no new independent expenditures");
            return Ok(rows);
        }

        let inserted = self.store.append_independent_expenditures(&rows)?;
        info!(path = path.as_str(), fetched = rows.len(), inserted, "independent expenditures stored");

        let subject = format!("New Independent Expenditures for {}!", date.format(DATE_FORMAT));
        if let Some(notice) = notice(&self.notifier, &self.email, notify, subject) {
            notice.send(IE_SUMMARY_COLUMNS, &rows);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CommitteeEntry, FilingKey};
    use crate::error::{FetchError, TrackerError};
    use crate::integration::memory::MemoryStore;
    use crate::notify::tests::RecordingNotifier;
    use crate::sources::tests::{offset, page, quick_http};
    use crate::sources::ApiFamily;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn tracker(base_url: String, store: MemoryStore) -> Tracker<MemoryStore, RecordingNotifier> {
        let client = ApiClient::new(ApiFamily::Aggregator, base_url, "pp-key".to_owned(), quick_http(0));
        let email = EmailConfig {
            from: "tracker@example.com".to_owned(),
            to: vec!["desk@example.com".to_owned()],
            ..Default::default()
        };
        Tracker::new(client, store, Some(RecordingNotifier::new(true)), email, 20)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 26).unwrap()
    }

    fn late_page(records: Vec<Value>) -> String {
        json!({"status": "OK", "results": records}).to_string()
    }

    fn contribution(filing: &str, transaction: &str, entity_type: &str, committee: &str) -> Value {
        json!({
            "fec_filing_id": filing,
            "transaction_id": transaction,
            "entity_type": entity_type,
            "fec_committee_id": committee,
            "fec_candidate_id": "H4VA07259",
            "contribution_date": "2024-03-25",
            "amount": 5000
        })
    }

    #[test]
    fn test_return_url_skips_the_pipeline() {
        let mut server = Server::new();
        let mock = server.mock("GET", Matcher::Any).expect(0).create();
        let mut tracker = tracker(server.url(), MemoryStore::default());

        let outcome = tracker.update_late_contributions(
            &LateScope::Candidate("H4VA07259".to_owned()),
            LateOptions { return_url: true, notify: true },
        ).unwrap();

        assert_eq!(outcome, LateOutcome::Url(format!("{}/candidates/H4VA07259/48hour.json", server.url())));
        mock.assert();
        assert!(tracker.notifier.as_ref().unwrap().sent.borrow().is_empty());
    }

    #[test]
    fn test_late_contributions_end_to_end() {
        let mut server = Server::new();
        let first = server.mock("GET", "/contributions/48hour/2024/03/26.json")
            .match_query(offset(0))
            .match_header("x-api-key", "pp-key")
            .with_body(late_page(vec![
                contribution("100", "1", "PAC", "C_NEW"),
                contribution("100", "2", "PAC", "C_NEW"),
                contribution("100", "3", "IND", "C_NEW"),
                contribution("900", "SEEN", "PAC", "C_KNOWN"),
            ]))
            .create();
        let last = server.mock("GET", "/contributions/48hour/2024/03/26.json")
            .match_query(offset(20))
            .with_body(late_page(vec![]))
            .create();
        let committee = server.mock("GET", "/committees/C_NEW.json")
            .match_query(Matcher::Any)
            .with_body(r#"{"status":"OK","results":[{"name":"BICE FOR CONGRESS"}]}"#)
            .expect(1)
            .create();
        let candidate = server.mock("GET", "/candidates/H4VA07259.json")
            .match_query(Matcher::Any)
            .with_body(r#"{"status":"OK","results":[{"display_name":"Sewell, Briana","district":"/seats/VA/house/07.json"}]}"#)
            .expect(1)
            .create();

        let mut store = MemoryStore::default();
        store.seen.push(FilingKey::new("900", "SEEN"));
        let mut tracker = tracker(server.url(), store);

        let outcome = tracker.update_late_contributions(&LateScope::Date(date()), LateOptions { return_url: false, notify: true }).unwrap();

        assert_eq!(outcome, LateOutcome::Completed(LateRunSummary {
            fetched: 4,
            enriched: 2,
            new_committees: 1,
            new_candidates: 1,
            notified: true,
        }));
        for mock in &[first, last, committee, candidate] {
            mock.assert();
        }

        assert_eq!(tracker.store.late_contributions.len(), 2);
        assert_eq!(tracker.store.committees, vec![
            CommitteeEntry { committee_id: "C_NEW".to_owned(), committee_name: "BICE FOR CONGRESS".to_owned() },
        ]);
        assert_eq!(tracker.store.candidates[0].info.state.as_deref(), Some("VA"));

        let sent = tracker.notifier.as_ref().unwrap().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Late Contributions for 2024-03-26!");
        assert!(sent[0].html_body.contains("BICE FOR CONGRESS"));
    }

    #[test]
    fn test_late_contributions_without_email() {
        let mut server = Server::new();
        let _page = server.mock("GET", "/committees/C1/48hour.json")
            .match_query(offset(0))
            .with_body(late_page(vec![contribution("1", "1", "PAC", "C_KNOWN")]))
            .create();
        let _last = server.mock("GET", "/committees/C1/48hour.json")
            .match_query(offset(20))
            .with_body(late_page(vec![]))
            .create();
        let _candidate = server.mock("GET", "/candidates/H4VA07259.json")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"status":"ERROR","message":"Not found"}"#)
            .create();

        let mut store = MemoryStore::default();
        store.committees.push(CommitteeEntry { committee_id: "C_KNOWN".to_owned(), committee_name: "KNOWN PAC".to_owned() });
        let mut tracker = tracker(server.url(), store);

        let outcome = tracker.update_late_contributions(&LateScope::Committee("C1".to_owned()), LateOptions::default()).unwrap();

        match outcome {
            LateOutcome::Completed(summary) => {
                assert_eq!((summary.enriched, summary.new_committees, summary.new_candidates), (1, 0, 1));
                assert!(!summary.notified);
            },
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(tracker.store.candidates[0].info.candidate_name, "QE");
        assert!(tracker.notifier.as_ref().unwrap().sent.borrow().is_empty());
    }

    #[test]
    fn test_late_contributions_fetch_failure() {
        let mut server = Server::new();
        let _rejected = server.mock("GET", "/contributions/48hour/2024/03/26.json")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"status":"ERROR","message":"Invalid API key"}"#)
            .create();
        let mut tracker = tracker(server.url(), MemoryStore::default());

        let result = tracker.update_late_contributions(&LateScope::Date(date()), LateOptions::default());

        match result {
            Err(TrackerError::Fetch(FetchError::Status { status, message, .. })) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            },
            other => panic!("unexpected result {:?}", other),
        }
        assert!(tracker.store.late_contributions.is_empty());
    }

    #[test]
    fn test_daily_transactions_stop_at_known_page() {
        let mut server = Server::new();
        let path = "/independent_expenditures/2024/03/26.json";
        let first = server.mock("GET", path).match_query(offset(0)).with_body(page(&["ie-3", "ie-1"])).create();
        let second = server.mock("GET", path).match_query(offset(20)).with_body(page(&["ie-1", "ie-2"])).create();
        let third = server.mock("GET", path).match_query(offset(40)).with_body(page(&["ie-0"])).expect(0).create();

        let mut store = MemoryStore::default();
        store.independent_expenditures.push(json!({"unique_id": "ie-1"}));
        store.independent_expenditures.push(json!({"unique_id": "ie-2"}));
        let mut tracker = tracker(server.url(), store);

        let rows = tracker.update_daily_transactions(Some(date()), true).unwrap();

        assert_eq!(rows, vec![json!({"unique_id": "ie-3"})]);
        first.assert();
        second.assert();
        third.assert();
        assert_eq!(tracker.store.independent_expenditures.len(), 3);

        let sent = tracker.notifier.as_ref().unwrap().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Independent Expenditures for 2024-03-26!");
        assert!(sent[0].html_body.contains("<th>support_or_oppose</th>"));
    }

    #[test]
    fn test_daily_transactions_nothing_new() {
        let mut server = Server::new();
        let _page = server.mock("GET", "/independent_expenditures/2024/03/26.json")
            .match_query(offset(0))
            .with_body(page(&["ie-1"]))
            .create();

        let mut store = MemoryStore::default();
        store.independent_expenditures.push(json!({"unique_id": "ie-1"}));
        let mut tracker = tracker(server.url(), store);

        let rows = tracker.update_daily_transactions(Some(date()), true).unwrap();

        assert!(rows.is_empty());
        assert_eq!(tracker.store.independent_expenditures.len(), 1);
        assert!(tracker.notifier.as_ref().unwrap().sent.borrow().is_empty());
    }
}

// https://projects.propublica.org/api-docs/campaign-finance/

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::America::New_York;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Result, TrackerError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const PATH_SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'<').add(b'>').add(b'?').add(b'`').add(b'{').add(b'}');

/// Which slice of 24/48-hour contributions to pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LateScope {
    Candidate(String),
    Committee(String),
    Date(NaiveDate),
    Today,
}

impl LateScope {
    pub fn path(&self, today: NaiveDate) -> String {
        match self {
            LateScope::Candidate(id) => format!("candidates/{}/48hour.json", segment(id)),
            LateScope::Committee(id) => format!("committees/{}/48hour.json", segment(id)),
            LateScope::Date(date) => late_by_date_path(*date),
            LateScope::Today => late_by_date_path(today),
        }
    }
}

fn late_by_date_path(date: NaiveDate) -> String {
    format!("contributions/48hour/{:04}/{:02}/{:02}.json", date.year(), date.month(), date.day())
}

pub fn independent_expenditures_path(date: NaiveDate) -> String {
    format!("independent_expenditures/{:04}/{:02}/{:02}.json", date.year(), date.month(), date.day())
}

pub fn committee_path(committee_id: &str) -> String {
    format!("committees/{}.json", segment(committee_id))
}

pub fn candidate_path(candidate_id: &str) -> String {
    format!("candidates/{}.json", segment(candidate_id))
}

pub fn document_url(committee_id: &str, filing_id: &str) -> String {
    format!("https://docquery.fec.gov/cgi-bin/forms/{}/{}/", segment(committee_id), segment(filing_id))
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| TrackerError::InvalidDate(input.to_owned()))
}

/// Filings are dated on the east coast.
pub fn today_eastern() -> NaiveDate {
    today_eastern_at(Utc::now())
}

pub fn today_eastern_at(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&New_York).date_naive()
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value.trim(), PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_late_scope_paths() {
        let today = day(2024, 3, 25);
        assert_eq!(LateScope::Candidate("H4VA07259".to_owned()).path(today), "candidates/H4VA07259/48hour.json");
        assert_eq!(LateScope::Committee("C00864215".to_owned()).path(today), "committees/C00864215/48hour.json");
        assert_eq!(LateScope::Date(day(2024, 11, 2)).path(today), "contributions/48hour/2024/11/02.json");
        assert_eq!(LateScope::Today.path(today), "contributions/48hour/2024/03/25.json");
    }

    #[test]
    fn test_entity_paths_are_encoded() {
        assert_eq!(committee_path("C00 1/2"), "committees/C00%201%2F2.json");
        assert_eq!(candidate_path("H4VA07259"), "candidates/H4VA07259.json");
        assert_eq!(independent_expenditures_path(day(2023, 1, 5)), "independent_expenditures/2023/01/05.json");
    }

    #[test]
    fn test_document_url() {
        assert_eq!(document_url("C00496760", "1790123"), "https://docquery.fec.gov/cgi-bin/forms/C00496760/1790123/");
    }

    fn instant(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_today_follows_new_york_daylight_time() {
        // EDT is UTC-4, so 04:30Z is already past midnight
        assert_eq!(today_eastern_at(instant("2026-07-01T04:30:00Z")), day(2026, 7, 1));
        assert_eq!(today_eastern_at(instant("2026-07-01T03:59:00Z")), day(2026, 6, 30));
        // EST is UTC-5
        assert_eq!(today_eastern_at(instant("2026-01-15T04:30:00Z")), day(2026, 1, 14));
        assert_eq!(today_eastern_at(instant("2026-01-15T05:00:00Z")), day(2026, 1, 15));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-3-25").unwrap(), day(2024, 3, 25));
        assert_eq!(parse_date("2024-03-25").unwrap(), day(2024, 3, 25));
        match parse_date("03/25/2024") {
            Err(TrackerError::InvalidDate(input)) => assert_eq!(input, "03/25/2024"),
            other => panic!("expected invalid date, got {:?}", other),
        }
    }
}

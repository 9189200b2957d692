// https://api.open.fec.gov/developers/#/receipts/get_schedules_schedule_a_

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{page_results, ApiClient};
use crate::error::{FetchError, Result, TrackerError};

const SCHEDULE_A_PATH: &str = "schedules/schedule_a";
const SCHEDULE_A_PAGE_SIZE: usize = 100;

/// Keys copied from `pagination.last_indexes` into the next request.
const CURSOR_KEYS: [&str; 2] = ["last_index", "last_contribution_receipt_date"];

/// Follows OpenFEC's keyset pagination. Each response names where the next page starts in
/// `pagination.last_indexes`; a missing cursor or an empty page ends the walk.
pub fn fetch_by_cursor(client: &ApiClient, path: &str, params: Vec<(&str, String)>) -> std::result::Result<Vec<Value>, FetchError> {
    let mut bucket = Vec::new();
    let mut query = params;

    loop {
        let body = client.fetch_json(path, &query)?;
        let cursor = body.pointer("/pagination/last_indexes").cloned().unwrap_or(Value::Null);

        let results = page_results(body);
        if results.is_empty() {
            break;
        }
        bucket.extend(results);

        let cursor = match cursor {
            Value::Object(map) if !map.is_empty() => map,
            _ => break,
        };
        debug!(last_index = ?cursor.get("last_index"), "advancing cursor");

        for key in CURSOR_KEYS.iter() {
            query.retain(|(k, _)| k != key);
            match cursor.get(*key) {
                Some(Value::String(s)) => query.push((*key, s.to_owned())),
                Some(Value::Number(n)) => query.push((*key, n.to_string())),
                _ => {},
            }
        }
        client.pause();
    }

    Ok(bucket)
}

/// Every receipt a committee took from other committees this cycle, flattened for export.
pub fn scrape_schedule_a(client: &ApiClient, committee_id: &str) -> Result<Vec<Map<String, Value>>> {
    let params = vec![
        ("committee_id", committee_id.to_owned()),
        ("per_page", SCHEDULE_A_PAGE_SIZE.to_string()),
        ("contributor_type", "committee".to_owned()),
    ];

    let results = fetch_by_cursor(client, SCHEDULE_A_PATH, params)?;
    if results.is_empty() {
        return Err(TrackerError::NoResults(format!("schedule A receipts of {}", committee_id)));
    }
    info!(committee_id, receipts = results.len(), "schedule A scrape finished");

    Ok(results.into_iter().filter_map(|r| match r {
        Value::Object(map) => Some(flatten_record(map)),
        _ => None,
    }).collect())
}

/// Nested objects become `{parent}_{child}` columns and lists become comma-joined text.
pub fn flatten_record(record: Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in record {
        match value {
            Value::Object(nested) => {
                for (child, child_value) in nested {
                    let column = format!("{}_{}", key, child);
                    flat.insert(column, join_list(child_value));
                }
            },
            other => { flat.insert(key, other); },
        }
    }
    flat
}

fn join_list(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(|i| match i {
                Value::String(s) => s.to_owned(),
                other => other.to_string(),
            }).collect();
            Value::String(joined.join(","))
        },
        other => other,
    }
}

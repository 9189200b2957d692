use std::io;
use std::thread::sleep;

use serde_json::Value;
use tracing::{debug, warn};

pub mod fec;
pub mod propublica;

use crate::config::HttpSettings;
use crate::error::FetchError;

pub const USER_AGENT: &str = "finance-tracker/0.1";

pub const DEFAULT_PAGE_SIZE: usize = 20;

const MISSING_ERROR_MESSAGE: &str = "error retrieving error message";

/// The two API families differ only in how they authenticate and size pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    /// ProPublica: key in an `X-API-Key` header, fixed page size.
    Aggregator,
    /// OpenFEC: key as the `api_key` query parameter, page size as `per_page`.
    Government,
}

/// What a single request produced. Retry policy is decided from this, not from error types.
#[derive(Debug)]
pub enum Outcome<T> {
    Page(T),
    Retryable(String),
    Fatal(FetchError),
}

/// Stops paging the moment a page has no survivors.
pub type RecordFilter<'a> = &'a dyn Fn(&Value) -> bool;

pub struct FetchOptions<'a> {
    pub page_size: usize,
    pub filter: Option<RecordFilter<'a>>,
    /// Stop once more than this many records are accumulated. The last page is kept whole.
    pub limit: Option<usize>,
    pub params: Vec<(&'a str, String)>,
}

impl<'a> Default for FetchOptions<'a> {
    fn default() -> FetchOptions<'a> {
        FetchOptions {
            page_size: DEFAULT_PAGE_SIZE,
            filter: None,
            limit: None,
            params: Vec::new(),
        }
    }
}

/// Single-entity lookups used to resolve names the caches don't know yet.
pub trait EntitySource {
    fn fetch_entity(&self, path: &str) -> Result<Value, FetchError>;
}

pub struct ApiClient {
    family: ApiFamily,
    base_url: String,
    api_key: String,
    http: HttpSettings,
}

pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

impl ApiClient {
    pub fn new(family: ApiFamily, base_url: String, api_key: String, http: HttpSettings) -> ApiClient {
        ApiClient { family, base_url, api_key, http }
    }

    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Walks `path` page by page, advancing the offset by `page_size`, until a page comes
    /// back empty, the filter rejects a whole page, or `limit` is exceeded.
    pub fn fetch(&self, path: &str, options: &FetchOptions) -> Result<Vec<Value>, FetchError> {
        if options.page_size == 0 {
            return Err(FetchError::ZeroPageSize { url: self.url_for(path) });
        }

        let mut bucket: Vec<Value> = Vec::new();
        let mut offset = 0;

        loop {
            debug!(offset, path, "requesting page");

            let mut query = options.params.clone();
            query.push(("offset", offset.to_string()));
            if self.family == ApiFamily::Government {
                query.push(("per_page", options.page_size.to_string()));
            }

            let body = self.fetch_json(path, &query)?;
            let results = page_results(body);
            if results.is_empty() {
                break;
            }

            let survivors: Vec<Value> = match options.filter {
                Some(keep) => results.into_iter().filter(|r| keep(r)).collect(),
                None => results,
            };
            if survivors.is_empty() {
                debug!(offset, "no records on this page survived the filter, stopping");
                break;
            }
            bucket.extend(survivors);

            if let Some(limit) = options.limit {
                if bucket.len() > limit {
                    break;
                }
            }

            offset += options.page_size;
            self.pause();
        }

        debug!(total = bucket.len(), path, "finished paging");
        Ok(bucket)
    }

    /// One logical request: undecodable 200 responses are re-requested up to `retries` times.
    pub fn fetch_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let mut failures = 0;
        loop {
            match self.get_json(path, query) {
                Outcome::Page(value) => return Ok(value),
                Outcome::Fatal(e) => return Err(e),
                Outcome::Retryable(message) => {
                    failures += 1;
                    if failures > self.http.retries {
                        return Err(FetchError::Decode { url: self.url_for(path), attempts: failures, message });
                    }
                    warn!(path, failures, "undecodable response, retrying in {:?}", self.http.retry_sleep);
                    sleep(self.http.retry_sleep);
                },
            }
        }
    }

    /// Sleeps the configured inter-page delay.
    pub fn pause(&self) {
        sleep(self.http.page_sleep);
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Outcome<Value> {
        let url = self.url_for(path);
        debug!(url = url.as_str(), "querying");

        let mut request = ureq::get(&url);
        request
            .set("User-Agent", USER_AGENT)
            .timeout_connect(self.http.connect_timeout_ms)
            .timeout_read(self.http.receive_timeout_ms);

        match self.family {
            ApiFamily::Aggregator => { request.set("X-API-Key", &self.api_key); },
            ApiFamily::Government => { request.query("api_key", &self.api_key); },
        }
        for (key, value) in query {
            request.query(key, value);
        }

        let response = request.call();
        if let Some(error) = response.synthetic_error() {
            return Outcome::Fatal(FetchError::Transport { url, message: error.to_string() });
        }

        let status = response.status();
        debug!(status, "response received");
        classify(&url, status, response.into_string())
    }
}

impl EntitySource for ApiClient {
    fn fetch_entity(&self, path: &str) -> Result<Value, FetchError> {
        match self.get_json(path, &[("offset", "0".to_owned())]) {
            Outcome::Page(value) => Ok(value),
            Outcome::Fatal(e) => Err(e),
            Outcome::Retryable(message) => Err(FetchError::Decode { url: self.url_for(path), attempts: 1, message }),
        }
    }
}

/// Turns a raw response into an outcome. Only a JSON decode failure on a 200 is retryable.
pub fn classify(url: &str, status: u16, body: io::Result<String>) -> Outcome<Value> {
    if status != 200 {
        let message = body.ok()
            .and_then(|b| serde_json::from_str::<Value>(&b).ok())
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(|m| m.to_owned()))
            .unwrap_or_else(|| MISSING_ERROR_MESSAGE.to_owned());
        return Outcome::Fatal(FetchError::Status { url: url.to_owned(), status, message });
    }

    let body = match body {
        Ok(b) => b,
        Err(e) => return Outcome::Fatal(FetchError::Transport { url: url.to_owned(), message: e.to_string() }),
    };

    match serde_json::from_str::<Value>(&body) {
        Ok(value) => Outcome::Page(value),
        Err(e) => Outcome::Retryable(e.to_string()),
    }
}

/// The `results` array of a page; anything else means the data has run out.
pub fn page_results(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(results)) => results,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// Table names used by the tracker. `test_suffix`, when set, is appended to every name so
/// a test run never touches production tables.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TableNames {
    pub independent_expenditures: String,
    pub late_contributions: String,
    pub committee_names: String,
    pub candidate_info: String,
    pub test_suffix: Option<String>,
}

impl Default for TableNames {
    fn default() -> TableNames {
        TableNames {
            independent_expenditures: "fiu_pp".to_owned(),
            late_contributions: "late_contributions".to_owned(),
            committee_names: "pac_names".to_owned(),
            candidate_info: "candidate_info".to_owned(),
            test_suffix: None,
        }
    }
}

impl TableNames {
    fn finalize(&mut self) {
        if let Some(suffix) = self.test_suffix.take() {
            for name in vec![
                &mut self.independent_expenditures,
                &mut self.late_contributions,
                &mut self.committee_names,
                &mut self.candidate_info,
            ] {
                name.push_str(&suffix);
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub sendgrid_url: String,
}

impl Default for EmailConfig {
    fn default() -> EmailConfig {
        EmailConfig {
            from: String::new(),
            to: Vec::new(),
            sendgrid_url: "https://api.sendgrid.com/v3/mail/send".to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub cycle: u32,
    pub aggregator_base_url: String, // the cycle is appended to this
    pub government_base_url: String,
    pub page_size: usize,
    pub page_sleep_ms: u64,
    pub retry_sleep_ms: u64,
    pub retries: u32,
    pub http_connect_timeout_ms: u64,
    pub http_receive_timeout_ms: u64,
    pub tables: TableNames,
    pub email: EmailConfig,
}

impl Default for TrackerConfig {
    fn default() -> TrackerConfig {
        TrackerConfig {
            cycle: 2024,
            aggregator_base_url: "https://api.propublica.org/campaign-finance/v1".to_owned(),
            government_base_url: "https://api.open.fec.gov/v1".to_owned(),
            page_size: 20,
            page_sleep_ms: 1000,
            retry_sleep_ms: 3000,
            retries: 5,
            http_connect_timeout_ms: 30000,
            http_receive_timeout_ms: 30000,
            tables: TableNames::default(),
            email: EmailConfig::default(),
        }
    }
}

/// Timeouts and pacing shared by every HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub connect_timeout_ms: u64,
    pub receive_timeout_ms: u64,
    pub page_sleep: Duration,
    pub retry_sleep: Duration,
    pub retries: u32,
}

impl TrackerConfig {
    /// A missing file yields the defaults; a present but malformed one is an error.
    pub fn load(path: &str) -> Result<TrackerConfig> {
        let mut config = match fs::read_to_string(path) {
            Ok(s) => TrackerConfig::parse(&s, path)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path, "no tracker config found, using defaults");
                TrackerConfig::default()
            },
            Err(source) => return Err(TrackerError::ConfigRead { path: path.to_owned(), source }),
        };
        config.tables.finalize();
        Ok(config)
    }

    fn parse(contents: &str, path: &str) -> Result<TrackerConfig> {
        let config: TrackerConfig = toml::from_str(contents).map_err(|source| TrackerError::ConfigParse { path: path.to_owned(), source })?;
        if config.page_size == 0 {
            return Err(TrackerError::ConfigInvalid { path: path.to_owned(), message: "page_size must be at least 1".to_owned() });
        }
        Ok(config)
    }

    pub fn aggregator_url(&self) -> String {
        format!("{}/{}", self.aggregator_base_url.trim_end_matches('/'), self.cycle)
    }

    pub fn http(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout_ms: self.http_connect_timeout_ms,
            receive_timeout_ms: self.http_receive_timeout_ms,
            page_sleep: Duration::from_millis(self.page_sleep_ms),
            retry_sleep: Duration::from_millis(self.retry_sleep_ms),
            retries: self.retries,
        }
    }
}

/// Private configuration (passwords, api keys, etc.), laid out as `[section] key = "..."`.
#[derive(Debug, Default)]
pub struct SecretConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SecretConfig {
    pub fn load(path: &str) -> Result<SecretConfig> {
        match fs::read_to_string(path) {
            Ok(s) => {
                let sections = toml::from_str(&s).map_err(|source| TrackerError::ConfigParse { path: path.to_owned(), source })?;
                Ok(SecretConfig { sections })
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SecretConfig::default()),
            Err(source) => Err(TrackerError::ConfigRead { path: path.to_owned(), source }),
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section).and_then(|s| s.get(key)).map(|v| v.as_str())
    }

    /// Looks up `[section] key`, falling back to the environment variable `env_var`.
    pub fn credential(&self, section: &str, key: &str, env_var: &str) -> Option<String> {
        match self.get(section, key) {
            Some(v) => Some(v.to_owned()),
            None => env::var(env_var).ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn require(&self, section: &str, key: &str, env_var: &str) -> Result<String> {
        self.credential(section, key, env_var)
            .ok_or_else(|| TrackerError::MissingCredential(env_var.to_owned()))
    }
}

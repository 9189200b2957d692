use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failures raised while talking to a remote campaign-finance API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout or a body that could not be read.
    #[error("Failed to retrieve data from {url}. Error: {message}")]
    Transport { url: String, message: String },

    #[error("{status}, {message} (url: {url})")]
    Status { url: String, status: u16, message: String },

    #[error("Response from {url} is not valid JSON after {attempts} attempt(s): {message}")]
    Decode { url: String, attempts: u32, message: String },

    #[error("Refusing to page {url} with a page size of 0")]
    ZeroPageSize { url: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error on table `{table}`: {source}")]
    Query {
        table: String,
        #[source]
        source: postgres::Error,
    },

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to read {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path} as TOML: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value in {path}: {message}")]
    ConfigInvalid { path: String, message: String },

    #[error("Missing credential `{0}`: set it in the secret config or the environment")]
    MissingCredential(String),

    #[error("Failed to read the database password: {0}")]
    PasswordPrompt(#[source] std::io::Error),

    #[error("Invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("No results returned for {0}")]
    NoResults(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

use std::path::PathBuf;

/// Errors that end a run. Everything page-local is absorbed by the crawl loop.
#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cannot read seed file {path}")]
    SeedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persist error: {0}")]
    Persist(#[from] std::io::Error),
}

/// Failure of a single retrieval tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,

    #[error("http status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("tier unavailable")]
    Unavailable,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// How one frontier page ended. None of these stop a domain pass; run-level
/// failures surface as `CrawlerError` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// A record was extracted and the sink accepted it.
    Job,
    /// The page was processed but produced nothing downstream.
    NoJob(Rejection),
    /// The page could not be retrieved by any tier.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ExtractionIncomplete,
    PushFailure,
}

/// The oracle could not produce a usable guess. Always absorbed as an empty
/// guess by the caller.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response has no message content")]
    MissingContent,

    #[error("reply is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

//! Error types for every pipeline stage.
//!
//! Each component returns its own error enum so the orchestrator can record
//! which stage failed and why. Only [`SetupError`] is fatal to a whole run;
//! everything else is caught per item and written onto its record.

use crate::models::Stage;
use std::time::Duration;
use thiserror::Error;

/// Failure while downloading a page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("http status {status}")]
    HttpStatus { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Classify a transport error from `reqwest`.
    pub fn from_reqwest_error(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Short machine-readable kind, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::Network(_) => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Failure while resolving an indirection link.
///
/// A resolution that merely fails to settle is not an error; it degrades to
/// the original URL. Only a URL that can never be valid fails the item.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("not an absolute url: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no article text could be extracted")]
    EmptyContent,

    #[error("extracted text too short ({length} chars, need {minimum})")]
    BelowMinLength { length: usize, minimum: usize },
}

/// Failure inside the summarization backend.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("summarization backend failed: {0}")]
    Backend(String),

    #[error("summarization backend returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Failure while querying the search feed for candidate articles.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("could not parse search feed: {0}")]
    Feed(#[from] quick_xml::DeError),
}

/// Problems that stop a run before any item is processed.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("could not read config file {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("could not build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure while persisting a batch report.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("output directory {path} is not writable: {source}")]
    Directory {
        path: String,
        source: std::io::Error,
    },

    #[error("could not write report {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The error carried by a single item once it transitions to `failed`.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),
}

/// A stage error tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    pub error: StageError,
}

impl StageFailure {
    pub fn new(stage: Stage, error: impl Into<StageError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::Network("reset".into()).kind(), "network");
        assert_eq!(FetchError::HttpStatus { status: 503 }.kind(), "http_status");
        assert_eq!(FetchError::Timeout(Duration::from_secs(10)).kind(), "timeout");
    }

    #[test]
    fn test_stage_failure_display_names_stage() {
        let failure = StageFailure::new(Stage::Fetching, FetchError::HttpStatus { status: 404 });
        assert_eq!(failure.to_string(), "fetching failed: http status 404");
    }

    #[test]
    fn test_extract_error_message() {
        let err = ExtractError::BelowMinLength {
            length: 12,
            minimum: 50,
        };
        assert_eq!(
            err.to_string(),
            "extracted text too short (12 chars, need 50)"
        );
    }
}

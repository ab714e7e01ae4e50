//! Error types for chainview

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Longest slice of a response body kept inside an error message.
const MAX_BODY_IN_ERROR: usize = 512;

/// Failure class of a single HTTP fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// DNS, connection refused, timeout, broken body stream.
    Unreachable,
    /// The server answered with a non-2xx status.
    HttpStatus,
    /// The body was not the JSON we expected.
    Decode,
}

/// Error returned by [`crate::fetcher::HttpFetcher`]. Never a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Unreachable,
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, body: &str) -> Self {
        Self {
            kind: FetchErrorKind::HttpStatus,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Decode,
            status: None,
            message: message.into(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind == FetchErrorKind::Unreachable
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::decode(err.to_string())
        } else {
            FetchError::unreachable(err.to_string())
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.kind, self.status) {
            (FetchErrorKind::Unreachable, _) => write!(f, "Endpoint unreachable: {}", self.message),
            (FetchErrorKind::HttpStatus, Some(status)) if self.message.is_empty() => {
                write!(f, "Request failed ({})", status)
            }
            (FetchErrorKind::HttpStatus, Some(status)) => {
                write!(f, "Request failed ({}): {}", status, self.message)
            }
            (FetchErrorKind::HttpStatus, None) => write!(f, "Request failed: {}", self.message),
            (FetchErrorKind::Decode, _) => write!(f, "Malformed response: {}", self.message),
        }
    }
}

impl std::error::Error for FetchError {}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Machine-readable classification of an [`ExplorerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unreachable,
    HttpStatus,
    Decode,
    Rpc,
    MalformedStatus,
    NotFound,
    AllVariantsExhausted,
    IndexingDisabled,
    SearchAborted,
    InvalidEndpoint,
    InvalidHeight,
    Config,
    Cancelled,
}

/// One abandoned transaction-search encoding and why page 1 failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantFailure {
    pub query: String,
    pub order_by: String,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum ExplorerError {
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Invalid block height {0:?}: expected a decimal number")]
    InvalidHeight(String),

    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Request failed ({status}): {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Node returned RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Status response has no latest block height: {0}")]
    MalformedStatus(String),

    #[error("Block at height {height} not found: {message}")]
    NotFound { height: String, message: String },

    #[error("Tx search failed for all {} query variants", .attempts.len())]
    AllVariantsExhausted { attempts: Vec<VariantFailure> },

    #[error("Transaction indexing is disabled on the node: {0}")]
    IndexingDisabled(String),

    #[error("Tx search failed on page {page}: {source}")]
    SearchAborted {
        page: u32,
        source: Box<ExplorerError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Refresh was superseded by a newer cycle")]
    Cancelled,
}

impl ExplorerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExplorerError::InvalidEndpoint { .. } => ErrorKind::InvalidEndpoint,
            ExplorerError::InvalidHeight(_) => ErrorKind::InvalidHeight,
            ExplorerError::Unreachable(_) => ErrorKind::Unreachable,
            ExplorerError::HttpStatus { .. } => ErrorKind::HttpStatus,
            ExplorerError::Decode(_) => ErrorKind::Decode,
            ExplorerError::Rpc { .. } => ErrorKind::Rpc,
            ExplorerError::MalformedStatus(_) => ErrorKind::MalformedStatus,
            ExplorerError::NotFound { .. } => ErrorKind::NotFound,
            ExplorerError::AllVariantsExhausted { .. } => ErrorKind::AllVariantsExhausted,
            ExplorerError::IndexingDisabled(_) => ErrorKind::IndexingDisabled,
            ExplorerError::SearchAborted { .. } => ErrorKind::SearchAborted,
            ExplorerError::Config(_) => ErrorKind::Config,
            ExplorerError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<FetchError> for ExplorerError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FetchErrorKind::Unreachable => ExplorerError::Unreachable(err.message),
            FetchErrorKind::HttpStatus => ExplorerError::HttpStatus {
                status: err.status.unwrap_or_default(),
                message: err.message,
            },
            FetchErrorKind::Decode => ExplorerError::Decode(err.message),
        }
    }
}

impl From<toml::de::Error> for ExplorerError {
    fn from(err: toml::de::Error) -> Self {
        ExplorerError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ExplorerError>;

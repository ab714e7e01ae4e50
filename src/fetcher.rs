//! Thin HTTP GET layer shared by the RPC and REST clients
//!
//! The fetcher never retries; callers own the retry/fallback policy.

use crate::error::{ExplorerError, FetchError, Result};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

const USER_AGENT: &str = concat!("chainview/", env!("CARGO_PKG_VERSION"));

/// A validated base URL (scheme + host) that paths are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| ExplorerError::InvalidEndpoint {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("base URL must not carry a query or fragment"));
        }

        Ok(Self {
            base: trimmed.trim_end_matches('/').to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Appends `path` verbatim.
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.base)
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExplorerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// GET `base + path` with `query` form-encoded and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        base: &Endpoint,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, FetchError> {
        let url = base.join(path);
        let start = Instant::now();

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(
            url = %url,
            status = %status.as_u16(),
            duration_ms = %start.elapsed().as_millis(),
            "http.get"
        );

        if !status.is_success() {
            return Err(FetchError::http_status(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| FetchError::decode(e.to_string()))
    }
}

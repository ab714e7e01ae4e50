//! Cosmos SDK REST (gRPC-gateway) client
//!
//! - [`accounts`] - account listing and balance enrichment

pub mod accounts;

use crate::error::Result;
use crate::fetcher::{Endpoint, HttpFetcher};
use serde::de::DeserializeOwned;

/// Client for one node's REST port.
#[derive(Debug, Clone)]
pub struct RestClient {
    fetcher: HttpFetcher,
    endpoint: Endpoint,
}

impl RestClient {
    pub fn new(fetcher: HttpFetcher, endpoint: Endpoint) -> Self {
        Self { fetcher, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        Ok(self.fetcher.get_json(&self.endpoint, path, query).await?)
    }
}

//! CometBFT JSON-RPC client
//!
//! - [`status`] - latest height from `/status`
//! - [`block`] - one block from `/block`
//! - [`tx_search`] - complete transaction set from `/tx_search`

pub mod block;
pub mod status;
pub mod tx_search;

use crate::error::{ExplorerError, FetchError, FetchErrorKind, Result};
use crate::fetcher::{Endpoint, HttpFetcher};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::Value;

/// `{"jsonrpc": "2.0", "id": .., "result": .., "error": ..}`
#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    /// `message: data`, where `data` carries the useful part on CometBFT.
    fn detail(&self) -> String {
        match self.data.as_ref().and_then(value_to_string) {
            Some(data) if !data.is_empty() => format!("{}: {}", self.message, data),
            _ => self.message.clone(),
        }
    }
}

/// Client for one node's RPC port.
#[derive(Debug, Clone)]
pub struct RpcClient {
    fetcher: HttpFetcher,
    endpoint: Endpoint,
}

impl RpcClient {
    pub fn new(fetcher: HttpFetcher, endpoint: Endpoint) -> Self {
        Self { fetcher, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Calls an RPC route and unwraps the envelope.
    ///
    /// `Ok(None)` means the node answered without a `result` and without an
    /// `error`; each caller decides what that means for its route.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let envelope: RpcEnvelope<T> = self
            .fetcher
            .get_json(&self.endpoint, path, query)
            .await
            .map_err(rpc_failure)?;

        if let Some(error) = envelope.error {
            return Err(ExplorerError::Rpc {
                code: error.code,
                message: error.detail(),
            });
        }
        Ok(envelope.result)
    }
}

/// Non-2xx replies from CometBFT still carry a JSON-RPC error body; those
/// become [`ExplorerError::Rpc`]. Bodies without an envelope stay `HttpStatus`.
fn rpc_failure(err: FetchError) -> ExplorerError {
    if err.kind == FetchErrorKind::HttpStatus {
        if let Ok(RpcEnvelope {
            error: Some(body), ..
        }) = serde_json::from_str::<RpcEnvelope<IgnoredAny>>(&err.message)
        {
            return ExplorerError::Rpc {
                code: body.code,
                message: body.detail(),
            };
        }
    }
    err.into()
}

/// Error text reported by the node itself through a JSON-RPC envelope.
///
/// Proxies and unrelated services answering on the RPC port never qualify,
/// whatever their body says.
pub(crate) fn node_message(err: &ExplorerError) -> Option<&str> {
    match err {
        ExplorerError::Rpc { message, .. } => Some(message),
        _ => None,
    }
}

/// CometBFT encodes most integers as strings; older nodes sometimes don't.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//! Configuration management for chainview

use crate::error::{ExplorerError, Result};
use crate::fetcher::Endpoint;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// CometBFT caps `per_page` at 100.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            rest_url: default_rest_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout, humantime syntax (`10s`, `1m 30s`).
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.timeout)
            .map_err(|e| ExplorerError::Config(format!("client.timeout {:?}: {}", self.timeout, e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Tried in order; JSON-quoted first, bare token second.
    #[serde(default = "default_query_variants")]
    pub query_variants: Vec<String>,
    #[serde(default = "default_order_variants")]
    pub order_variants: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            query_variants: default_query_variants(),
            order_variants: default_order_variants(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_page_limit")]
    pub balance_limit: u32,
    /// Upper bound on balance requests in flight at once.
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            balance_limit: default_page_limit(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        Endpoint::parse(&self.endpoints.rpc_url)?;
        Endpoint::parse(&self.endpoints.rest_url)?;
        self.client.timeout()?;

        if self.search.page_size == 0 || self.search.page_size > MAX_PAGE_SIZE {
            return Err(ExplorerError::Config(format!(
                "search.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.search.query_variants.is_empty() || self.search.order_variants.is_empty() {
            return Err(ExplorerError::Config(
                "search.query_variants and search.order_variants must not be empty".to_string(),
            ));
        }
        if self.accounts.page_limit == 0 || self.accounts.balance_limit == 0 {
            return Err(ExplorerError::Config(
                "accounts.page_limit and accounts.balance_limit must be positive".to_string(),
            ));
        }
        if self.accounts.max_concurrent_lookups == 0 {
            return Err(ExplorerError::Config(
                "accounts.max_concurrent_lookups must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads `config.toml` from the working directory; falls back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ExplorerError::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    config.validate()?;
    Ok(config)
}

fn default_rpc_url() -> String {
    "http://localhost:26657".to_string()
}

fn default_rest_url() -> String {
    "http://localhost:1317".to_string()
}

fn default_timeout() -> String {
    "10s".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_query_variants() -> Vec<String> {
    vec!["\"tx.height>0\"".to_string(), "tx.height>0".to_string()]
}

fn default_order_variants() -> Vec<String> {
    vec!["\"desc\"".to_string(), "desc".to_string()]
}

fn default_page_limit() -> u32 {
    100
}

fn default_max_concurrent_lookups() -> usize {
    8
}

fn default_api_port() -> u16 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.endpoints.rpc_url, "http://localhost:26657");
        assert_eq!(config.endpoints.rest_url, "http://localhost:1317");
        assert_eq!(config.search.page_size, 100);
        assert_eq!(config.search.query_variants.len(), 2);
        assert_eq!(config.accounts.max_concurrent_lookups, 8);
        assert_eq!(config.client.timeout().unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[endpoints]\nrpc_url = \"http://node:26657\"\n\n[accounts]\nmax_concurrent_lookups = 2\n\n[client]\ntimeout = \"1m 30s\""
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.endpoints.rpc_url, "http://node:26657");
        assert_eq!(config.endpoints.rest_url, "http://localhost:1317");
        assert_eq!(config.accounts.max_concurrent_lookups, 2);
        assert_eq!(config.accounts.page_limit, 100);
        assert_eq!(config.client.timeout().unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.search.page_size = 500;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.order_variants.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.accounts.max_concurrent_lookups = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.endpoints.rest_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.client.timeout = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\npage_size = ").unwrap();
        let err = load_config_from(file.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}

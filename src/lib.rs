//! chainview - query orchestration for Cosmos/CometBFT chain explorers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Transport
//! - [`fetcher`] - HTTP GET + JSON decoding, endpoint validation
//!
//! ## Node Clients
//! - [`rpc`] - height, block and transaction search over JSON-RPC
//! - [`rest`] - account listing and balance enrichment over REST
//!
//! ## Orchestration
//! - [`aggregator`] - refresh cycles and the published snapshot
//! - [`types`] - domain records
//!
//! ## Consumers
//! - [`api`] - HTTP snapshot API (feature `api`)
//! - [`cli`] - terminal rendering for the `chainview` binary
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Transport
// ============================================================================
pub mod fetcher;

// ============================================================================
// Node Clients
// ============================================================================
pub mod rest;
pub mod rpc;

// ============================================================================
// Orchestration
// ============================================================================
pub mod aggregator;
pub mod types;

// ============================================================================
// Consumers
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod cli;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use aggregator::{Aggregator, RefreshRequest, Snapshot, StageOutcome};
pub use error::{ExplorerError, Result};

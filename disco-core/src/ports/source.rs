// disco-core/src/ports/source.rs

// This file defines what the discoverer needs from a discovery endpoint,
// without knowing how it's done. The same contract serves a flat file on
// disk and a Consul cluster across the network.

use crate::error::DiscoError;
use async_trait::async_trait;
use serde_json::Value;

/// A pluggable discovery endpoint. Lifecycle: Unconnected -> Connected ->
/// Disconnected. `connect` is idempotent; implementations memoise whatever
/// state a reconnect would rebuild.
///
/// Transport errors are the source's own business: a failing endpoint logs
/// and reports an empty mapping from `state` rather than tearing down the
/// discovery loop.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Stable name used to key change-detection hashes (defaults to the
    /// source kind at construction).
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<(), DiscoError>;

    /// Current state as a mapping.
    async fn state(&self) -> Result<Value, DiscoError>;

    /// Cleanly shut down any watches, polls or connections.
    async fn disconnect(&self) -> Result<(), DiscoError>;
}

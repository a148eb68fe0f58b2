//! Clients for talking to storage nodes.
//!
//! The coordinator only sees the [`NodeClient`] trait. [`HttpNodeClient`] talks
//! to a remote node server; [`LocalNodeClient`] wraps an in-process
//! [`NodeStore`](crate::NodeStore).

pub mod http;
pub mod local;

use crate::codec::Chunk;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpNodeClient;
pub use local::LocalNodeClient;

/// What a node reports about its store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub chunk_count: usize,
    pub total_size: u64,
    pub storage_type: String,
    #[serde(default)]
    pub server_id: Option<String>,
}

/// Remote operations on one node's chunk store.
///
/// Failures come back typed: `NotFound` for a missing chunk, `RemoteError` for
/// any other failure status and `Unreachable` when the node cannot be reached.
/// Implementations do not retry.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Address used in logs and error messages.
    fn address(&self) -> &str;

    async fn store(&self, chunk: &Chunk) -> Result<()>;

    async fn get(&self, chunk_id: &str) -> Result<Chunk>;

    async fn delete(&self, chunk_id: &str) -> Result<()>;

    async fn health_check(&self) -> Result<()>;

    async fn info(&self) -> Result<NodeInfo>;
}

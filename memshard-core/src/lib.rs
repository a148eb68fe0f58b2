//! Memshard Core - chunked file storage scattered across in-memory nodes
//!
//! A file is split into a fixed number of chunks, each chunk is placed on a
//! storage node by index, and the file is reassembled on read:
//! - SHA256 checksums per chunk and per file
//! - Static round-robin placement over a fixed node list
//! - Concurrent all-or-nothing fan-out for store and fetch
//! - Volatile in-memory node stores

pub mod client;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod node;
pub mod storage;

pub use client::{ApiClient, HealthReport};
pub use codec::{
    Chunk, FileMetadata, chunk_id, compute_hash, reassemble, reconstruct, split, split_file,
    validate, validate_metadata, verify_hash,
};
pub use coordinator::{
    Coordinator, CoordinatorConfig, HealthStatus, HealthSummary, node_for_chunk,
};
pub use error::{MemshardError, Result};
pub use node::{HttpNodeClient, LocalNodeClient, NodeClient, NodeInfo};
pub use storage::{NodeStore, StoreInfo};

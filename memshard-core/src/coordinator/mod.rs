//! Placement coordinator: owns file metadata and fans chunk operations out to
//! the storage nodes.
//!
//! Every fan-out spawns one task per chunk and waits for all of them before
//! returning. The first error observed fails the whole operation; work that
//! already reached other nodes is left in place.

pub mod placement;

use crate::codec::{self, Chunk, FileMetadata};
use crate::error::{MemshardError, Result};
use crate::node::NodeClient;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use ulid::Ulid;

pub use placement::node_for_chunk;

pub const DEFAULT_CHUNK_COUNT: usize = 6;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024 * 1024;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Chunks per uploaded file; also the node count needed to report healthy.
    pub chunk_count: usize,
    pub max_file_size: u64,
    /// Applied to every single node call.
    pub call_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub healthy_node_count: usize,
    pub total_node_count: usize,
}

pub struct Coordinator {
    nodes: Vec<Arc<dyn NodeClient>>,
    files: RwLock<HashMap<String, FileMetadata>>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// The node order is fixed for the coordinator's lifetime; placement
    /// depends on it.
    pub fn new(nodes: Vec<Arc<dyn NodeClient>>, config: CoordinatorConfig) -> Result<Self> {
        if nodes.is_empty() {
            return Err(MemshardError::InvalidArgument(
                "at least one storage node is required".to_string(),
            ));
        }
        if config.chunk_count == 0 {
            return Err(MemshardError::InvalidArgument(
                "chunk count must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            nodes,
            files: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn chunk_count(&self) -> usize {
        self.config.chunk_count
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_for(&self, chunk_index: usize) -> (usize, Arc<dyn NodeClient>) {
        let node_index = node_for_chunk(chunk_index, self.nodes.len());
        (node_index, self.nodes[node_index].clone())
    }

    /// Split `data`, distribute the chunks and register the file.
    ///
    /// Metadata is only registered when every chunk was stored. The registered
    /// (and returned) metadata holds chunk descriptors without payloads.
    pub async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        content_type: &str,
        chunk_count: usize,
    ) -> Result<FileMetadata> {
        if data.len() as u64 > self.config.max_file_size {
            return Err(MemshardError::InvalidArgument(format!(
                "file size {} exceeds the maximum of {} bytes",
                data.len(),
                self.config.max_file_size
            )));
        }

        let file_id = Ulid::new().to_string();
        let mut metadata = codec::split(data, chunk_count, &file_id)?;
        metadata.original_name = filename.to_string();
        metadata.content_type = content_type.to_string();

        self.distribute(&metadata).await?;

        metadata.strip_payloads();
        self.files
            .write()
            .await
            .insert(file_id.clone(), metadata.clone());

        tracing::info!(
            "Uploaded file {} ({}, {} bytes, {} chunks)",
            file_id,
            metadata.original_name,
            metadata.size,
            metadata.chunk_count
        );
        Ok(metadata)
    }

    /// Store every chunk of `metadata` on its node, concurrently.
    pub async fn distribute(&self, metadata: &FileMetadata) -> Result<()> {
        let call_timeout = self.config.call_timeout;
        let mut tasks = JoinSet::new();

        for chunk in &metadata.chunks {
            let (node_index, node) = self.node_for(chunk.index);
            let chunk = chunk.clone();

            tasks.spawn(async move {
                match within(call_timeout, node.address(), node.store(&chunk)).await {
                    Ok(()) => {
                        tracing::debug!("Chunk {} stored on node {}", chunk.index, node_index);
                        Ok(())
                    }
                    Err(error) => {
                        tracing::warn!(
                            "Failed to store chunk {} on node {} ({}): {}",
                            chunk.index,
                            node_index,
                            node.address(),
                            error
                        );
                        Err(error)
                    }
                }
            });
        }

        join_barrier(tasks).await?;
        Ok(())
    }

    /// Fetch every chunk of `metadata` from its node, concurrently.
    ///
    /// Each fetched chunk is validated and must match its descriptor. A node
    /// that no longer has a chunk yields [`MemshardError::MissingChunk`].
    /// Returned chunks are in index order.
    pub async fn collect(&self, metadata: &FileMetadata) -> Result<Vec<Chunk>> {
        let call_timeout = self.config.call_timeout;
        let mut tasks = JoinSet::new();

        for descriptor in &metadata.chunks {
            let (node_index, node) = self.node_for(descriptor.index);
            let expected = descriptor.descriptor();

            tasks.spawn(fetch_chunk(node, node_index, expected, call_timeout));
        }

        let mut chunks = join_barrier(tasks).await?;
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }

    pub async fn download(&self, file_id: &str) -> Result<Bytes> {
        let (_, data) = self.download_with_metadata(file_id).await?;
        Ok(data)
    }

    /// Collect and reassemble a file, verifying the whole-file checksum.
    pub async fn download_with_metadata(&self, file_id: &str) -> Result<(FileMetadata, Bytes)> {
        let metadata = self.file_info(file_id).await?;
        let mut chunks = self.collect(&metadata).await?;
        let data = codec::reassemble(&mut chunks)?;

        let checksum = codec::compute_hash(&data);
        if checksum != metadata.checksum {
            return Err(MemshardError::ChunkCorrupt(format!(
                "file {} reassembled with checksum {}, expected {}",
                file_id, checksum, metadata.checksum
            )));
        }

        Ok((metadata, data))
    }

    pub async fn file_info(&self, file_id: &str) -> Result<FileMetadata> {
        let files = self.files.read().await;
        files
            .get(file_id)
            .cloned()
            .ok_or_else(|| MemshardError::NotFound(format!("file {}", file_id)))
    }

    /// Forget a file, then delete its chunks from the nodes.
    ///
    /// Chunk deletes are best effort: failures are logged and the chunks stay
    /// behind on their nodes.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let metadata = self
            .files
            .write()
            .await
            .remove(file_id)
            .ok_or_else(|| MemshardError::NotFound(format!("file {}", file_id)))?;

        let call_timeout = self.config.call_timeout;
        let mut tasks = JoinSet::new();

        for chunk in metadata.chunks {
            let (node_index, node) = self.node_for(chunk.index);

            tasks.spawn(async move {
                if let Err(error) =
                    within(call_timeout, node.address(), node.delete(&chunk.id)).await
                {
                    tracing::warn!(
                        "Failed to delete chunk {} from node {}: {}",
                        chunk.index,
                        node_index,
                        error
                    );
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                tracing::warn!("Chunk delete task failed: {}", error);
            }
        }

        tracing::info!("Deleted file {}", file_id);
        Ok(())
    }

    /// Ids of every registered file, oldest upload first.
    pub async fn list(&self) -> Vec<String> {
        let files = self.files.read().await;
        let mut ids: Vec<String> = files.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Probe every node concurrently. Healthy requires at least `chunk_count`
    /// reachable nodes.
    pub async fn health_summary(&self) -> HealthSummary {
        let call_timeout = self.config.call_timeout;
        let mut tasks = JoinSet::new();

        for (node_index, node) in self.nodes.iter().enumerate() {
            let node = node.clone();
            tasks.spawn(async move {
                match within(call_timeout, node.address(), node.health_check()).await {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::warn!("Storage node {} is unavailable: {}", node_index, error);
                        false
                    }
                }
            });
        }

        let mut healthy_node_count = 0usize;
        while let Some(joined) = tasks.join_next().await {
            if matches!(joined, Ok(true)) {
                healthy_node_count += 1;
            }
        }

        let status = if healthy_node_count >= self.config.chunk_count {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthSummary {
            status,
            healthy_node_count,
            total_node_count: self.nodes.len(),
        }
    }
}

/// Fetch one chunk and check it against its descriptor.
async fn fetch_chunk(
    node: Arc<dyn NodeClient>,
    node_index: usize,
    expected: Chunk,
    call_timeout: Duration,
) -> Result<Chunk> {
    let chunk = within(call_timeout, node.address(), node.get(&expected.id))
        .await
        .map_err(|error| match error {
            MemshardError::NotFound(_) => MemshardError::MissingChunk(expected.index),
            other => other,
        })?;

    if chunk.id != expected.id
        || chunk.index != expected.index
        || chunk.file_id != expected.file_id
        || chunk.checksum != expected.checksum
    {
        return Err(MemshardError::ChunkCorrupt(format!(
            "node {} returned chunk {} (index {}) for {}",
            node_index, chunk.id, chunk.index, expected.id
        )));
    }
    codec::validate(&chunk)?;

    tracing::debug!("Chunk {} fetched from node {}", chunk.index, node_index);
    Ok(chunk)
}

/// Bound a single node call; expiry counts as the node being unreachable.
async fn within<T>(
    call_timeout: Duration,
    address: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(call_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MemshardError::Unreachable(format!(
            "{}: no response within {:?}",
            address, call_timeout
        ))),
    }
}

/// Wait for every task, then return all results or the first error observed.
async fn join_barrier<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(tasks.len());
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|error| MemshardError::Internal(format!("chunk task failed: {}", error)))
            .and_then(|result| result);

        match outcome {
            Ok(value) => values.push(value),
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(values),
    }
}

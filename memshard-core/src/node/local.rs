use super::{NodeClient, NodeInfo};
use crate::codec::{self, Chunk};
use crate::error::Result;
use crate::storage::NodeStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Node client backed by a [`NodeStore`] in the same process.
///
/// Mirrors the node server: chunks are validated before they are stored.
#[derive(Clone)]
pub struct LocalNodeClient {
    address: String,
    store: Arc<NodeStore>,
}

impl LocalNodeClient {
    pub fn new(address: impl Into<String>, store: Arc<NodeStore>) -> Self {
        Self {
            address: address.into(),
            store,
        }
    }

    pub fn store_handle(&self) -> &Arc<NodeStore> {
        &self.store
    }
}

#[async_trait]
impl NodeClient for LocalNodeClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn store(&self, chunk: &Chunk) -> Result<()> {
        codec::validate(chunk)?;
        self.store.store(chunk).await;
        Ok(())
    }

    async fn get(&self, chunk_id: &str) -> Result<Chunk> {
        self.store.get(chunk_id).await
    }

    async fn delete(&self, chunk_id: &str) -> Result<()> {
        self.store.delete(chunk_id).await
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn info(&self) -> Result<NodeInfo> {
        let info = self.store.info().await;
        Ok(NodeInfo {
            chunk_count: info.chunk_count,
            total_size: info.total_size,
            storage_type: info.storage_type,
            server_id: Some(self.address.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemshardError;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_local_client_rejects_corrupt_chunk() {
        let client = LocalNodeClient::new("local-0", Arc::new(NodeStore::new()));
        let mut chunk = codec::split(Bytes::from_static(b"payload"), 1, "f")
            .unwrap()
            .chunks
            .remove(0);
        chunk.checksum = "0".repeat(64);

        let err = client.store(&chunk).await.unwrap_err();
        assert!(matches!(err, MemshardError::ChunkCorrupt(_)));
        assert!(client.store_handle().is_empty().await);
    }

    #[tokio::test]
    async fn test_local_client_info() {
        let client = LocalNodeClient::new("local-0", Arc::new(NodeStore::new()));
        let metadata = codec::split(Bytes::from_static(b"0123456789"), 2, "f").unwrap();
        for chunk in &metadata.chunks {
            client.store(chunk).await.unwrap();
        }

        let info = client.info().await.unwrap();
        assert_eq!(info.chunk_count, 2);
        assert_eq!(info.total_size, 10);
        assert_eq!(info.server_id.as_deref(), Some("local-0"));
    }
}

use crate::codec::Chunk;
use crate::error::{MemshardError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub const STORAGE_TYPE_MEMORY: &str = "memory";

/// Snapshot of what a node currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub chunk_count: usize,
    pub total_size: u64,
    pub storage_type: String,
}

/// NodeStore keeps a single node's chunks in memory, keyed by chunk id.
///
/// Nothing is persisted: dropping the store (or the process) loses every chunk.
#[derive(Default)]
pub struct NodeStore {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk, replacing any chunk with the same id.
    ///
    /// The payload is copied so the store never shares a buffer with the caller.
    pub async fn store(&self, chunk: &Chunk) {
        let stored = Chunk {
            data: chunk.data.as_deref().map(Bytes::copy_from_slice),
            ..chunk.clone()
        };

        let mut chunks = self.chunks.write().await;
        chunks.insert(stored.id.clone(), stored);

        tracing::debug!(
            "Stored chunk {} for file {} (index {}, {} bytes)",
            chunk.id,
            chunk.file_id,
            chunk.index,
            chunk.size
        );
    }

    pub async fn get(&self, chunk_id: &str) -> Result<Chunk> {
        let chunks = self.chunks.read().await;
        chunks
            .get(chunk_id)
            .cloned()
            .ok_or_else(|| MemshardError::NotFound(format!("chunk {}", chunk_id)))
    }

    pub async fn contains(&self, chunk_id: &str) -> bool {
        self.chunks.read().await.contains_key(chunk_id)
    }

    pub async fn delete(&self, chunk_id: &str) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        match chunks.remove(chunk_id) {
            Some(_) => Ok(()),
            None => Err(MemshardError::NotFound(format!("chunk {}", chunk_id))),
        }
    }

    /// Ids of every stored chunk, in no particular order.
    pub async fn list(&self) -> Vec<String> {
        self.chunks.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Total payload bytes currently held.
    pub async fn usage(&self) -> u64 {
        let chunks = self.chunks.read().await;
        chunks.values().map(|chunk| chunk.payload().len() as u64).sum()
    }

    pub async fn info(&self) -> StoreInfo {
        let chunks = self.chunks.read().await;
        StoreInfo {
            chunk_count: chunks.len(),
            total_size: chunks.values().map(|chunk| chunk.payload().len() as u64).sum(),
            storage_type: STORAGE_TYPE_MEMORY.to_string(),
        }
    }

    /// Drop every chunk. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut chunks = self.chunks.write().await;
        let removed = chunks.len();
        chunks.clear();
        removed
    }

    /// Eviction hook. No policy is implemented yet: nothing is removed and the
    /// current chunk count is returned.
    pub async fn compact(&self) -> usize {
        let chunks = self.chunks.write().await;
        chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::split;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn chunks_of(data: &'static [u8], count: usize, file_id: &str) -> Vec<Chunk> {
        split(Bytes::from_static(data), count, file_id).unwrap().chunks
    }

    #[tokio::test]
    async fn test_store_get_delete() {
        let store = NodeStore::new();
        let chunk = chunks_of(b"test data content", 1, "f").remove(0);

        store.store(&chunk).await;
        assert!(store.contains(&chunk.id).await);

        let fetched = assert_ok!(store.get(&chunk.id).await);
        assert_eq!(fetched, chunk);

        assert_ok!(store.delete(&chunk.id).await);
        assert!(!store.contains(&chunk.id).await);

        let err = assert_err!(store.get(&chunk.id).await);
        assert!(err.is_not_found());
        let err = assert_err!(store.delete(&chunk.id).await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_store_copies_payload() {
        let store = NodeStore::new();
        let chunk = chunks_of(b"shared buffer", 1, "f").remove(0);
        let original_ptr = chunk.payload().as_ptr();

        store.store(&chunk).await;
        let fetched = store.get(&chunk.id).await.unwrap();

        assert_eq!(fetched.payload(), chunk.payload());
        assert_ne!(fetched.payload().as_ptr(), original_ptr);
    }

    #[tokio::test]
    async fn test_store_overwrites_existing_id() {
        let store = NodeStore::new();
        let first = chunks_of(b"first", 1, "f").remove(0);
        let second = chunks_of(b"second!", 1, "f").remove(0);
        assert_eq!(first.id, second.id);

        store.store(&first).await;
        store.store(&second).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&first.id).await.unwrap(), second);
        assert_eq!(store.usage().await, 7);
    }

    #[tokio::test]
    async fn test_list_usage_info() {
        let store = NodeStore::new();
        for chunk in chunks_of(b"0123456789", 3, "f") {
            store.store(&chunk).await;
        }

        let mut ids = store.list().await;
        ids.sort();
        assert_eq!(ids, vec!["f_chunk_0", "f_chunk_1", "f_chunk_2"]);
        assert_eq!(store.usage().await, 10);

        let info = store.info().await;
        assert_eq!(info.chunk_count, 3);
        assert_eq!(info.total_size, 10);
        assert_eq!(info.storage_type, "memory");
    }

    #[tokio::test]
    async fn test_compact_keeps_chunks_and_clear_drops_them() {
        let store = NodeStore::new();
        for chunk in chunks_of(b"abcdef", 2, "f") {
            store.store(&chunk).await;
        }

        assert_eq!(store.compact().await, 2);
        assert_eq!(store.len().await, 2);

        assert_eq!(store.clear().await, 2);
        assert!(store.is_empty().await);
        assert_eq!(store.usage().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = Arc::new(NodeStore::new());
        let mut handles = Vec::new();
        for file in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let metadata = split(Bytes::from(vec![file as u8; 64]), 4, &format!("f{}", file))
                    .unwrap();
                for chunk in &metadata.chunks {
                    store.store(chunk).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 32);
        assert_eq!(store.usage().await, 8 * 64);
    }
}

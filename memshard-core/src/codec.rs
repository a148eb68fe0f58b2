//! Chunk codec: splitting a byte sequence into indexed, checksummed chunks and
//! putting it back together.
//!
//! Everything here is pure apart from [`split_file`], which only reads its input
//! from disk before delegating to [`split`].

use crate::error::{MemshardError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

/// One contiguous slice of a file.
///
/// A chunk without `data` is a descriptor: the coordinator keeps those once the
/// payload has been handed to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub index: usize,
    pub file_id: String,
    pub size: u64,
    pub checksum: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "payload_serde"
    )]
    pub data: Option<Bytes>,
}

impl Chunk {
    /// Payload bytes, empty for a descriptor.
    pub fn payload(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// A copy of this chunk without its payload.
    pub fn descriptor(&self) -> Chunk {
        Chunk {
            data: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub checksum: String,
    #[serde(default)]
    pub content_type: String,
    pub chunk_count: usize,
    pub chunks: Vec<Chunk>,
}

impl FileMetadata {
    /// Drop every chunk payload, keeping only the descriptors.
    pub fn strip_payloads(&mut self) {
        for chunk in &mut self.chunks {
            chunk.data = None;
        }
    }
}

/// Deterministic chunk id, recomputable by anyone holding the file id.
pub fn chunk_id(file_id: &str, index: usize) -> String {
    format!("{}_chunk_{}", file_id, index)
}

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that data matches the expected hash
pub fn verify_hash(data: &[u8], expected_hash: &str) -> Result<()> {
    let actual_hash = compute_hash(data);
    if actual_hash != expected_hash {
        return Err(MemshardError::ChunkCorrupt(format!(
            "checksum mismatch: expected {}, actual {}",
            expected_hash, actual_hash
        )));
    }
    Ok(())
}

/// Split `data` into exactly `chunk_count` chunks.
///
/// Every chunk but the last gets `len / chunk_count` bytes; the last one also
/// takes the remainder. When `chunk_count` exceeds the data length the leading
/// chunks are empty. Chunk payloads are slices of `data`, not copies.
pub fn split(data: Bytes, chunk_count: usize, file_id: &str) -> Result<FileMetadata> {
    if chunk_count == 0 {
        return Err(MemshardError::InvalidArgument(
            "chunk count must be greater than zero".to_string(),
        ));
    }

    let base_size = data.len() / chunk_count;
    let remainder = data.len() % chunk_count;

    let mut chunks = Vec::with_capacity(chunk_count);
    let mut offset = 0usize;
    for index in 0..chunk_count {
        let len = if index == chunk_count - 1 {
            base_size + remainder
        } else {
            base_size
        };
        let payload = data.slice(offset..offset + len);
        offset += len;

        chunks.push(Chunk {
            id: chunk_id(file_id, index),
            index,
            file_id: file_id.to_string(),
            size: len as u64,
            checksum: compute_hash(&payload),
            data: Some(payload),
        });
    }

    Ok(FileMetadata {
        id: file_id.to_string(),
        original_name: String::new(),
        size: data.len() as u64,
        checksum: compute_hash(&data),
        content_type: String::new(),
        chunk_count,
        chunks,
    })
}

/// Read a file from disk and [`split`] it. `original_name` is set to the file's
/// base name.
pub async fn split_file(
    path: impl AsRef<Path>,
    chunk_count: usize,
    file_id: &str,
) -> Result<FileMetadata> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;

    let mut metadata = split(Bytes::from(data), chunk_count, file_id)?;
    metadata.original_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(metadata)
}

/// Check a chunk's payload against its declared size and checksum.
pub fn validate(chunk: &Chunk) -> Result<()> {
    let Some(data) = chunk.data.as_ref() else {
        return Err(MemshardError::ChunkCorrupt(format!(
            "chunk {} has no payload",
            chunk.id
        )));
    };

    if data.len() as u64 != chunk.size {
        return Err(MemshardError::ChunkCorrupt(format!(
            "chunk {} declares {} bytes but carries {}",
            chunk.id,
            chunk.size,
            data.len()
        )));
    }

    verify_hash(data, &chunk.checksum).map_err(|error| {
        MemshardError::ChunkCorrupt(format!("chunk {}: {}", chunk.id, error))
    })
}

/// Check the structural invariants of file metadata.
///
/// The whole-file checksum is not verified here; that needs the reassembled
/// bytes.
pub fn validate_metadata(metadata: &FileMetadata) -> Result<()> {
    if metadata.chunks.len() != metadata.chunk_count {
        return Err(MemshardError::MetadataInconsistent(format!(
            "file {} declares {} chunks but lists {}",
            metadata.id,
            metadata.chunk_count,
            metadata.chunks.len()
        )));
    }

    let mut total_size = 0u64;
    for (position, chunk) in metadata.chunks.iter().enumerate() {
        if chunk.index != position {
            return Err(MemshardError::MetadataInconsistent(format!(
                "wrong chunk index: expected {}, got {}",
                position, chunk.index
            )));
        }
        if chunk.file_id != metadata.id {
            return Err(MemshardError::MetadataInconsistent(format!(
                "chunk {} belongs to file {}, not {}",
                position, chunk.file_id, metadata.id
            )));
        }
        total_size += chunk.size;
    }

    if total_size != metadata.size {
        return Err(MemshardError::MetadataInconsistent(format!(
            "chunk sizes add up to {} bytes, file size is {}",
            total_size, metadata.size
        )));
    }

    Ok(())
}

/// Write chunk payloads to `output` in index order.
///
/// `chunks` is sorted in place first. After sorting, position `i` must hold
/// index `i`; the first position that does not is reported as
/// [`MemshardError::MissingChunk`].
pub fn reconstruct<W: Write>(chunks: &mut [Chunk], output: &mut W) -> Result<()> {
    if chunks.is_empty() {
        return Err(MemshardError::MissingChunk(0));
    }

    chunks.sort_by_key(|chunk| chunk.index);

    if let Some((position, _)) = chunks
        .iter()
        .enumerate()
        .find(|(position, chunk)| chunk.index != *position)
    {
        return Err(MemshardError::MissingChunk(position));
    }

    for chunk in chunks.iter() {
        let data = chunk.data.as_ref().ok_or_else(|| {
            MemshardError::ChunkCorrupt(format!("chunk {} has no payload", chunk.id))
        })?;
        output.write_all(data)?;
    }
    output.flush()?;

    Ok(())
}

/// [`reconstruct`] into memory.
pub fn reassemble(chunks: &mut [Chunk]) -> Result<Bytes> {
    let capacity: u64 = chunks.iter().map(|chunk| chunk.size).sum();
    let mut buffer = Vec::with_capacity(capacity as usize);
    reconstruct(chunks, &mut buffer)?;
    Ok(Bytes::from(buffer))
}

/// Payloads travel as standard padded base64 in JSON.
mod payload_serde {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match data {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|value| {
                STANDARD
                    .decode(value.as_bytes())
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

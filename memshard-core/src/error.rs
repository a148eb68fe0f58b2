use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemshardError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Chunk corrupt: {0}")]
    ChunkCorrupt(String),

    #[error("Metadata inconsistent: {0}")]
    MetadataInconsistent(String),

    #[error("Missing chunk with index {0}")]
    MissingChunk(usize),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote error: status={status} body={body}")]
    RemoteError { status: u16, body: String },

    #[error("Node unreachable: {0}")]
    Unreachable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MemshardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors caused by the caller's input or by data failing integrity checks.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::ChunkCorrupt(_) | Self::MetadataInconsistent(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MemshardError>;

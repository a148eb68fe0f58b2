use super::{NodeClient, NodeInfo};
use crate::codec::Chunk;
use crate::error::{MemshardError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Node client speaking the node server's JSON API over HTTP.
#[derive(Clone)]
pub struct HttpNodeClient {
    address: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpNodeClient {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Self::with_timeout(address, DEFAULT_NODE_TIMEOUT)
    }

    pub fn with_timeout(address: impl Into<String>, timeout: Duration) -> Result<Self> {
        let address = address.into();
        let base_url = base_url_for(&address);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MemshardError::Config(format!("http client: {}", error)))?;

        Ok(Self {
            address,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chunks_url(&self) -> String {
        format!("{}/api/v1/chunks", self.base_url)
    }

    fn chunk_url(&self, chunk_id: &str) -> String {
        format!("{}/api/v1/chunks/{}", self.base_url, chunk_id)
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn store(&self, chunk: &Chunk) -> Result<()> {
        let response = self
            .client
            .post(self.chunks_url())
            .json(chunk)
            .send()
            .await
            .map_err(|error| request_error(&self.address, error))?;

        ensure_success(response, || format!("chunk {}", chunk.id)).await?;
        Ok(())
    }

    async fn get(&self, chunk_id: &str) -> Result<Chunk> {
        let response = self
            .client
            .get(self.chunk_url(chunk_id))
            .send()
            .await
            .map_err(|error| request_error(&self.address, error))?;

        let response = ensure_success(response, || format!("chunk {}", chunk_id)).await?;
        response
            .json::<Chunk>()
            .await
            .map_err(|error| request_error(&self.address, error))
    }

    async fn delete(&self, chunk_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.chunk_url(chunk_id))
            .send()
            .await
            .map_err(|error| request_error(&self.address, error))?;

        ensure_success(response, || format!("chunk {}", chunk_id)).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|error| request_error(&self.address, error))?;

        ensure_success(response, || format!("health endpoint on {}", self.address)).await?;
        Ok(())
    }

    async fn info(&self) -> Result<NodeInfo> {
        let response = self
            .client
            .get(format!("{}/api/v1/info", self.base_url))
            .send()
            .await
            .map_err(|error| request_error(&self.address, error))?;

        let response =
            ensure_success(response, || format!("info endpoint on {}", self.address)).await?;
        response
            .json::<NodeInfo>()
            .await
            .map_err(|error| request_error(&self.address, error))
    }
}

/// Map a reqwest failure: undecodable bodies are internal errors, anything
/// else means the peer could not be reached in time.
pub(crate) fn request_error(address: &str, error: reqwest::Error) -> MemshardError {
    if error.is_decode() {
        MemshardError::Internal(format!("invalid response from {}: {}", address, error))
    } else {
        MemshardError::Unreachable(format!("{}: {}", address, error))
    }
}

/// Turn a non-success response into `NotFound` (404) or `RemoteError`.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    missing: impl FnOnce() -> String,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(MemshardError::NotFound(missing()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(MemshardError::RemoteError {
        status: status.as_u16(),
        body,
    })
}

/// `host:port` becomes `http://host:port`; explicit schemes are kept.
pub(crate) fn base_url_for(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

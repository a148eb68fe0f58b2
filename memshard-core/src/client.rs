//! Client for the coordinator's HTTP API.

use crate::codec::FileMetadata;
use crate::coordinator::HealthStatus;
use crate::error::{MemshardError, Result};
use crate::node::http::{base_url_for, ensure_success, request_error};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Uploads of large files need far more than a node call.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Body of `GET /health` on the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub healthy_servers: usize,
    pub total_servers: usize,
    pub timestamp: i64,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_API_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MemshardError::Config(format!("http client: {}", error)))?;

        Ok(Self {
            base_url: base_url_for(base_url.as_ref()),
            client,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/api/v1/files", self.base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/api/v1/files/{}", self.base_url, file_id)
    }

    /// Upload a file from disk as the multipart field `file`.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<FileMetadata> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|error| MemshardError::Internal(error.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.files_url())
            .multipart(form)
            .send()
            .await
            .map_err(|error| request_error(&self.base_url, error))?;

        let response = ensure_success(response, || "upload endpoint".to_string()).await?;
        response
            .json::<FileMetadata>()
            .await
            .map_err(|error| request_error(&self.base_url, error))
    }

    /// Stream a file's bytes into `output_path`. Returns the bytes written.
    pub async fn download_file(&self, file_id: &str, output_path: impl AsRef<Path>) -> Result<u64> {
        let response = self
            .client
            .get(self.file_url(file_id))
            .send()
            .await
            .map_err(|error| request_error(&self.base_url, error))?;
        let response = ensure_success(response, || format!("file {}", file_id)).await?;

        let mut output = tokio::fs::File::create(output_path.as_ref()).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(item) = stream.next().await {
            let bytes = item.map_err(|error| request_error(&self.base_url, error))?;
            output.write_all(&bytes).await?;
            written += bytes.len() as u64;
        }
        output.flush().await?;

        Ok(written)
    }

    pub async fn file_info(&self, file_id: &str) -> Result<FileMetadata> {
        let response = self
            .client
            .get(format!("{}/info", self.file_url(file_id)))
            .send()
            .await
            .map_err(|error| request_error(&self.base_url, error))?;

        let response = ensure_success(response, || format!("file {}", file_id)).await?;
        response
            .json::<FileMetadata>()
            .await
            .map_err(|error| request_error(&self.base_url, error))
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.file_url(file_id))
            .send()
            .await
            .map_err(|error| request_error(&self.base_url, error))?;

        ensure_success(response, || format!("file {}", file_id)).await?;
        Ok(())
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.files_url())
            .send()
            .await
            .map_err(|error| request_error(&self.base_url, error))?;

        let response = ensure_success(response, || "files endpoint".to_string()).await?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|error| request_error(&self.base_url, error))
    }

    pub async fn health(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|error| request_error(&self.base_url, error))?;

        let response = ensure_success(response, || "health endpoint".to_string()).await?;
        response
            .json::<HealthReport>()
            .await
            .map_err(|error| request_error(&self.base_url, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_report_wire_format() {
        let report: HealthReport = serde_json::from_str(
            r#"{"status":"degraded","healthy_servers":2,"total_servers":6,"timestamp":1700000000}"#,
        )
        .unwrap();
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.healthy_servers, 2);
        assert_eq!(report.total_servers, 6);
    }

    #[tokio::test]
    async fn test_api_unreachable() {
        let client = ApiClient::with_timeout("127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = client.list_files().await.unwrap_err();
        assert!(matches!(err, MemshardError::Unreachable(_)), "{:?}", err);
    }
}

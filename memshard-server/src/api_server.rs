use crate::config::Config;
use crate::http_error::ApiError;
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use memshard_core::{
    Coordinator, FileMetadata, HealthReport, HttpNodeClient, MemshardError, NodeClient, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

const UPLOAD_FIELD: &str = "file";

pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub file_id: String,
}

pub fn router(state: Arc<ApiState>) -> Router {
    let max_file_size = state.coordinator.config().max_file_size;
    let body_limit =
        usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);

    let api = Router::new()
        .route("/files", get(list_files).post(upload_file))
        .route("/files/:file_id", get(download_file).delete(delete_file))
        .route("/files/:file_id/info", get(file_info));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(config: Config) -> Result<()> {
    let nodes = config
        .storage_servers
        .iter()
        .map(|address| {
            let client = HttpNodeClient::with_timeout(address.clone(), config.node_timeout())?;
            Ok(Arc::new(client) as Arc<dyn NodeClient>)
        })
        .collect::<Result<Vec<_>>>()?;

    let coordinator = Arc::new(Coordinator::new(nodes, config.coordinator_config())?);
    tracing::info!(
        "Coordinator using {} storage nodes, {} chunks per file",
        coordinator.node_count(),
        coordinator.chunk_count()
    );

    let app = router(Arc::new(ApiState { coordinator }));

    let address = config.api_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("API server listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

fn multipart_error(error: MultipartError) -> ApiError {
    ApiError(MemshardError::InvalidArgument(format!(
        "invalid multipart upload: {}",
        error.body_text()
    )))
}

async fn upload_file(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        let coordinator = &state.coordinator;
        let metadata = coordinator
            .upload(data, &filename, &content_type, coordinator.chunk_count())
            .await?;

        return Ok((StatusCode::OK, axum::Json(metadata)).into_response());
    }

    Err(ApiError(MemshardError::InvalidArgument(format!(
        "multipart field '{}' is missing",
        UPLOAD_FIELD
    ))))
}

async fn download_file(
    State(state): State<Arc<ApiState>>,
    Path(file_id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let (metadata, data) = state.coordinator.download_with_metadata(&file_id).await?;
    tracing::info!("Serving file {} ({} bytes)", file_id, data.len());

    Ok(file_response(&metadata, data))
}

fn file_response(metadata: &FileMetadata, data: Bytes) -> Response {
    let content_type = if metadata.content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        metadata.content_type.clone()
    };

    // Header values must stay visible ASCII.
    let filename: String = metadata
        .original_name
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
        (header::CONTENT_LENGTH, data.len().to_string()),
    ];

    (StatusCode::OK, headers, data).into_response()
}

async fn file_info(
    State(state): State<Arc<ApiState>>,
    Path(file_id): Path<String>,
) -> std::result::Result<axum::Json<FileMetadata>, ApiError> {
    Ok(axum::Json(state.coordinator.file_info(&file_id).await?))
}

async fn delete_file(
    State(state): State<Arc<ApiState>>,
    Path(file_id): Path<String>,
) -> std::result::Result<axum::Json<DeleteResponse>, ApiError> {
    state.coordinator.delete(&file_id).await?;

    Ok(axum::Json(DeleteResponse {
        message: "file deleted".to_string(),
        file_id,
    }))
}

async fn list_files(State(state): State<Arc<ApiState>>) -> axum::Json<Vec<String>> {
    axum::Json(state.coordinator.list().await)
}

async fn health_handler(State(state): State<Arc<ApiState>>) -> axum::Json<HealthReport> {
    let summary = state.coordinator.health_summary().await;
    axum::Json(HealthReport {
        status: summary.status,
        healthy_servers: summary.healthy_node_count,
        total_servers: summary.total_node_count,
        timestamp: chrono::Utc::now().timestamp(),
    })
}

use crate::config::Config;
use crate::http_error::ApiError;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use memshard_core::{Chunk, MemshardError, NodeStore, Result, validate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct NodeState {
    pub store: Arc<NodeStore>,
    pub server_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub message: String,
    pub chunk_id: String,
    pub server_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub message: String,
    pub chunks_removed: usize,
    pub server_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkListResponse {
    pub chunks: Vec<String>,
    pub count: usize,
    pub server_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub memory_usage_bytes: u64,
    pub memory_usage_mb: f64,
    pub server_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeHealthResponse {
    pub status: String,
    pub server_id: String,
    pub timestamp: i64,
}

pub fn router(state: Arc<NodeState>) -> Router {
    let api = Router::new()
        .route(
            "/chunks",
            get(list_chunks).post(store_chunk).delete(clear_chunks),
        )
        .route("/chunks/:chunk_id", get(get_chunk).delete(delete_chunk))
        .route("/info", get(info_handler))
        .route("/memory", get(memory_handler))
        .route("/compact", post(compact_handler));

    // Chunks of a large file are far beyond the default JSON body limit.
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_node_server(config: Config) -> Result<()> {
    let state = Arc::new(NodeState {
        store: Arc::new(NodeStore::new()),
        server_id: config.server_id.clone(),
    });
    let app = router(state);

    let address = config.node_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        "Storage node {} listening on {}",
        config.server_id,
        address
    );

    axum::serve(listener, app).await?;

    Ok(())
}

async fn store_chunk(
    State(state): State<Arc<NodeState>>,
    payload: std::result::Result<axum::Json<Chunk>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let axum::Json(chunk) = payload.map_err(|rejection| {
        MemshardError::InvalidArgument(format!("invalid chunk body: {}", rejection.body_text()))
    })?;
    validate(&chunk)?;

    state.store.store(&chunk).await;
    tracing::info!(
        "Stored chunk {} ({} bytes) on node {}",
        chunk.id,
        chunk.size,
        state.server_id
    );

    let response = ChunkResponse {
        message: "chunk stored".to_string(),
        chunk_id: chunk.id,
        server_id: state.server_id.clone(),
    };
    Ok((StatusCode::OK, axum::Json(response)))
}

async fn get_chunk(
    State(state): State<Arc<NodeState>>,
    Path(chunk_id): Path<String>,
) -> std::result::Result<axum::Json<Chunk>, ApiError> {
    let chunk = state.store.get(&chunk_id).await?;
    Ok(axum::Json(chunk))
}

async fn delete_chunk(
    State(state): State<Arc<NodeState>>,
    Path(chunk_id): Path<String>,
) -> std::result::Result<axum::Json<ChunkResponse>, ApiError> {
    state.store.delete(&chunk_id).await?;
    tracing::info!("Deleted chunk {} on node {}", chunk_id, state.server_id);

    Ok(axum::Json(ChunkResponse {
        message: "chunk deleted".to_string(),
        chunk_id,
        server_id: state.server_id.clone(),
    }))
}

async fn clear_chunks(State(state): State<Arc<NodeState>>) -> axum::Json<RemovedResponse> {
    let removed = state.store.clear().await;
    tracing::info!("Cleared {} chunks on node {}", removed, state.server_id);

    axum::Json(RemovedResponse {
        message: "storage cleared".to_string(),
        chunks_removed: removed,
        server_id: state.server_id.clone(),
    })
}

async fn list_chunks(State(state): State<Arc<NodeState>>) -> axum::Json<ChunkListResponse> {
    let chunks = state.store.list().await;
    axum::Json(ChunkListResponse {
        count: chunks.len(),
        chunks,
        server_id: state.server_id.clone(),
    })
}

async fn info_handler(State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    let info = state.store.info().await;
    axum::Json(serde_json::json!({
        "chunk_count": info.chunk_count,
        "total_size": info.total_size,
        "storage_type": info.storage_type,
        "server_id": state.server_id,
    }))
}

async fn memory_handler(State(state): State<Arc<NodeState>>) -> axum::Json<MemoryResponse> {
    let usage = state.store.usage().await;
    axum::Json(MemoryResponse {
        memory_usage_bytes: usage,
        memory_usage_mb: usage as f64 / (1024.0 * 1024.0),
        server_id: state.server_id.clone(),
    })
}

async fn compact_handler(State(state): State<Arc<NodeState>>) -> axum::Json<RemovedResponse> {
    let count = state.store.compact().await;
    tracing::info!("Compaction on node {} saw {} chunks", state.server_id, count);

    axum::Json(RemovedResponse {
        message: "compaction complete".to_string(),
        chunks_removed: count,
        server_id: state.server_id.clone(),
    })
}

async fn health_handler(State(state): State<Arc<NodeState>>) -> axum::Json<NodeHealthResponse> {
    axum::Json(NodeHealthResponse {
        status: "healthy".to_string(),
        server_id: state.server_id.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use bytes::Bytes;
    use memshard_core::{HttpNodeClient, NodeClient, split};
    use tower::ServiceExt;

    fn test_state() -> Arc<NodeState> {
        Arc::new(NodeState {
            store: Arc::new(NodeStore::new()),
            server_id: "node-test".to_string(),
        })
    }

    fn sample_chunks() -> Vec<Chunk> {
        split(Bytes::from_static(b"memshard node server test payload"), 3, "file-1")
            .unwrap()
            .chunks
    }

    fn post_chunk(chunk: &Chunk) -> Request<Body> {
        Request::post("/api/v1/chunks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(chunk).unwrap()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_get_chunk() {
        let state = test_state();
        let app = router(state.clone());
        let chunk = sample_chunks().remove(0);

        let response = app.clone().oneshot(post_chunk(&chunk)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored: ChunkResponse = body_json(response).await;
        assert_eq!(stored.chunk_id, chunk.id);
        assert_eq!(stored.server_id, "node-test");

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/chunks/{}", chunk.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Chunk = body_json(response).await;
        assert_eq!(fetched, chunk);
    }

    #[tokio::test]
    async fn test_store_rejects_corrupt_chunk() {
        let state = test_state();
        let app = router(state.clone());
        let mut chunk = sample_chunks().remove(1);
        chunk.data = Some(Bytes::from_static(b"tampered"));

        let response = app.clone().oneshot(post_chunk(&chunk)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.is_empty().await);

        let response = app
            .oneshot(
                Request::post("/api/v1/chunks")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_chunk_is_not_found() {
        let app = router(test_state());

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/chunks/nope_chunk_0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::delete("/api/v1/chunks/nope_chunk_0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_info_memory_and_clear() {
        let state = test_state();
        let app = router(state.clone());
        let chunks = sample_chunks();
        for chunk in &chunks {
            state.store.store(chunk).await;
        }
        let total: u64 = chunks.iter().map(|chunk| chunk.size).sum();

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/chunks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed: ChunkListResponse = body_json(response).await;
        assert_eq!(listed.count, 3);

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let info: serde_json::Value = body_json(response).await;
        assert_eq!(info["chunk_count"], 3);
        assert_eq!(info["total_size"], total);
        assert_eq!(info["storage_type"], "memory");

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/memory").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let memory: MemoryResponse = body_json(response).await;
        assert_eq!(memory.memory_usage_bytes, total);

        let response = app
            .clone()
            .oneshot(Request::delete("/api/v1/chunks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cleared: RemovedResponse = body_json(response).await;
        assert_eq!(cleared.chunks_removed, 3);
        assert!(state.store.is_empty().await);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let health: NodeHealthResponse = body_json(response).await;
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_http_node_client_against_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, router(test_state())).await.unwrap();
        });

        let client = HttpNodeClient::new(address).unwrap();
        client.health_check().await.unwrap();

        let chunk = sample_chunks().remove(2);
        client.store(&chunk).await.unwrap();
        assert_eq!(client.get(&chunk.id).await.unwrap(), chunk);

        let info = client.info().await.unwrap();
        assert_eq!(info.chunk_count, 1);
        assert_eq!(info.server_id.as_deref(), Some("node-test"));

        client.delete(&chunk.id).await.unwrap();
        assert!(client.get(&chunk.id).await.unwrap_err().is_not_found());
        assert!(client.delete(&chunk.id).await.unwrap_err().is_not_found());

        let mut corrupt = chunk.clone();
        corrupt.checksum = "0".repeat(64);
        let err = client.store(&corrupt).await.unwrap_err();
        assert!(
            matches!(err, MemshardError::RemoteError { status: 400, .. }),
            "{:?}",
            err
        );
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use memshard_core::MemshardError;
use serde::{Deserialize, Serialize};

/// JSON body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error carrying the core error to the status it maps to.
#[derive(Debug)]
pub struct ApiError(pub MemshardError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<MemshardError> for ApiError {
    fn from(error: MemshardError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (MemshardError::NotFound("file x".into()), StatusCode::NOT_FOUND),
            (MemshardError::InvalidArgument("bad".into()), StatusCode::BAD_REQUEST),
            (MemshardError::ChunkCorrupt("hash".into()), StatusCode::BAD_REQUEST),
            (
                MemshardError::MetadataInconsistent("count".into()),
                StatusCode::BAD_REQUEST,
            ),
            (MemshardError::MissingChunk(3), StatusCode::INTERNAL_SERVER_ERROR),
            (
                MemshardError::Unreachable("node".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError(error).status(), expected);
        }
    }
}

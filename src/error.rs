//! Error types for the highlight pipeline and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::path::PathBuf;
use thiserror::Error;

/// Per-image pipeline failure. Fatal for the image, never for the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image {path:?}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("text detection failed: {0:#}")]
    Detection(anyhow::Error),

    #[error("failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Request validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter text to search for")]
    BlankQuery,
    #[error("No images uploaded")]
    NoImages,
    #[error("Please upload at least one image")]
    NoNamedImages,
}

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error("No occurrences of \"{query}\" found in any uploaded images")]
    NoMatches { query: String },

    #[error("File not found")]
    NotFound,

    #[error("Processing failed: {0}")]
    Internal(String),

    #[error("Download failed")]
    DownloadFailed,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Multipart(_) | ApiError::NoMatches { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::DownloadFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(ValidationError::BlankQuery).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NoMatches { query: "x".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_no_matches_message_names_query() {
        let err = ApiError::NoMatches {
            query: "receipt".into(),
        };
        assert_eq!(
            err.to_string(),
            "No occurrences of \"receipt\" found in any uploaded images"
        );
    }
}

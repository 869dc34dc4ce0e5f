//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::service::TileError;
use crate::tile::{CoordError, IdentifierError};

/// An error rendered as `{"detail": "..."}` with its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl From<TileError> for ApiError {
    fn from(err: TileError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            // Backend details stay in the log.
            error!(error = %err, "Request failed");
            let detail = match err {
                TileError::CacheIoFailed(_) => "tile cache unavailable",
                _ => "tile backend unavailable",
            };
            return Self {
                status,
                detail: detail.to_string(),
            };
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<IdentifierError> for ApiError {
    fn from(err: IdentifierError) -> Self {
        TileError::from(err).into()
    }
}

impl From<CoordError> for ApiError {
    fn from(err: CoordError) -> Self {
        TileError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;

    #[test]
    fn test_client_error_keeps_message() {
        let err = ApiError::from(TileError::UnknownField("secret".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "unknown field 'secret'");
    }

    #[test]
    fn test_server_error_hides_backend_details() {
        let err = ApiError::from(TileError::BackendQueryFailed(DatabaseError::Query(
            "password authentication failed for user \"tiles\"".into(),
        )));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.detail.contains("password"));
    }

    #[test]
    fn test_not_found_mapping() {
        let err = ApiError::from(TileError::UnknownDatabase("nope".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}

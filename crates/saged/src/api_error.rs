//! HTTP mapping of engine errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sage_common::{ErrorBody, SageError};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing verified identity")]
    Unauthenticated,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] SageError),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Code for failures that never reach the engine
pub const CODE_UNAUTHENTICATED: i32 = -32001;
pub const CODE_INTERNAL: i32 = -32603;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(e) => match e {
                SageError::NotFound { .. } => StatusCode::NOT_FOUND,
                SageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                SageError::ValidationUnsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SageError::PersistenceConflict { .. }
                | SageError::PersistenceUnavailable(_)
                | SageError::Io(_)
                | SageError::Json(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ApiError::Unauthenticated => CODE_UNAUTHENTICATED,
            ApiError::BadRequest(_) => SageError::InvalidInput(String::new()).code(),
            ApiError::Engine(e) => e.code(),
            ApiError::Join(_) => CODE_INTERNAL,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("  Request failed: {}", self);
        } else if status != StatusCode::NOT_FOUND {
            warn!("  Request rejected: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_common::{NotFoundKind, PuzzleType};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                ApiError::Engine(SageError::not_found(NotFoundKind::Topic, "x")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Engine(SageError::InvalidInput("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Engine(SageError::ValidationUnsupported(PuzzleType::FillBlank)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Engine(SageError::PersistenceUnavailable("disk".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err);
        }
    }

    #[test]
    fn test_code_passes_through() {
        let err = ApiError::Engine(SageError::not_found(NotFoundKind::Path, "p"));
        assert_eq!(err.code(), SageError::not_found(NotFoundKind::Path, "p").code());
        assert_eq!(ApiError::Unauthenticated.code(), CODE_UNAUTHENTICATED);
    }
}

use axum::{Json, extract::multipart::MultipartError, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The visitor is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation conflicts with the current state of the room.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RoomNotFound(_) | StorageError::QuestionNotFound { .. } => {
                ServiceError::NotFound(err.to_string())
            }
            StorageError::RoomClosed(_)
            | StorageError::RoomAlreadyClosed(_)
            | StorageError::CodeSpaceExhausted { .. } => ServiceError::Conflict(err.to_string()),
            StorageError::EmptyText | StorageError::LikesAtZero { .. } => {
                ServiceError::InvalidInput(err.to_string())
            }
            StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The visitor may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: StorageError) -> StatusCode {
        AppError::from(ServiceError::from(err))
            .into_response()
            .status()
    }

    #[test]
    fn storage_errors_map_to_http_statuses() {
        assert_eq!(status_of(StorageError::RoomNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(StorageError::QuestionNotFound {
                room_id: 1,
                question_id: 2
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(StorageError::RoomClosed(1)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StorageError::RoomAlreadyClosed(1)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StorageError::CodeSpaceExhausted { attempts: 3 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(StorageError::EmptyText), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(StorageError::LikesAtZero {
                room_id: 1,
                question_id: 1
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StorageError::unavailable(
                "down".into(),
                std::io::Error::other("boom")
            )),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn service_only_errors_map_to_http_statuses() {
        let forbidden = AppError::from(ServiceError::Forbidden("not yours".into()));
        let degraded = AppError::from(ServiceError::Degraded);
        let timeout = AppError::from(ServiceError::Timeout);

        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            degraded.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            timeout.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

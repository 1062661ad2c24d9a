//! HTTP error mapping
//!
//! Every layer keeps its own error type; handlers return [`ApiError`] and
//! the conversions below pick the status code.

use actix_web::{error, http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;
use validator::ValidationErrors;

use crate::core::{HandoffError, WatchError};
use crate::models::ErrorResponse;
use crate::services::{CacheError, PostgresError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation_failed",
            ApiError::Unavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Internal details stay in the log
        let message = match self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message,
            status_code: status.as_u16(),
        })
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        tracing::info!("Validation failed: {:?}", errors);
        ApiError::Validation(errors.to_string())
    }
}

impl From<PostgresError> for ApiError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            PostgresError::InvalidInput(msg) => ApiError::BadRequest(msg),
            PostgresError::SqlxError(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                tracing::error!("Database unavailable: {}", err);
                ApiError::Unavailable("Database temporarily unavailable".to_string())
            }
            other => {
                tracing::error!("Database error: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::error!("Cache error: {}", err);
        ApiError::Unavailable("Cache temporarily unavailable".to_string())
    }
}

impl From<HandoffError> for ApiError {
    fn from(err: HandoffError) -> Self {
        if err.is_forbidden() {
            ApiError::Forbidden(err.to_string())
        } else {
            ApiError::BadRequest(err.to_string())
        }
    }
}

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::NotFound(id) => ApiError::NotFound(format!("negotiation {} not found", id)),
            WatchError::Forbidden { .. } => {
                ApiError::Forbidden("You are not a party to this negotiation".to_string())
            }
            WatchError::Store(e) => {
                tracing::warn!("Update watch failed on store: {}", e);
                ApiError::Unavailable("Transient store error, retry".to_string())
            }
            WatchError::Marker(e) => {
                tracing::warn!("Update watch failed on marker store: {}", e);
                ApiError::Unavailable("Transient store error, retry".to_string())
            }
            WatchError::Cancelled => ApiError::Unavailable("Server is shutting down".to_string()),
        }
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    ApiError::Validation(format!("Invalid JSON: {}", err)).into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    ApiError::Validation(format!("Invalid query: {}", err)).into()
}

/// Handle path segment errors (non-numeric ids)
pub fn handle_path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::NotFound(format!("Invalid path: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckpointType;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation("x".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_handoff_mapping() {
        let forbidden: ApiError = HandoffError::NotParty(4).into();
        assert!(matches!(forbidden, ApiError::Forbidden(_)));

        let invalid: ApiError =
            HandoffError::PrerequisiteNotScanned(CheckpointType::DeliveryToProfessional).into();
        assert!(matches!(invalid, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_watch_errors_distinguish_forbidden_from_transient() {
        let forbidden: ApiError = WatchError::Forbidden { negotiation_id: 1, user_id: 2 }.into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let store: ApiError = WatchError::Store(PostgresError::InvalidInput("down".into())).into();
        assert_eq!(store.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let missing: ApiError = WatchError::NotFound(3).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_message_redacted() {
        let response = ApiError::Internal("password=hunter2".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

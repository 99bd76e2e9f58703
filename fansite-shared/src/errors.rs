use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E4xxx: Chat store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    BadRequest,

    // Chat (E4xxx)
    ConfigurationError,
    ConnectivityError,
    ReplicationError,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::BadRequest => "E0008",

            // Chat
            Self::ConfigurationError => "E4001",
            Self::ConnectivityError => "E4002",
            Self::ReplicationError => "E4003",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ConnectivityError => StatusCode::SERVICE_UNAVAILABLE,
            Self::ReplicationError => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(diesel::result::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectivityError, message)
    }

    pub fn replication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReplicationError, message)
    }

    /// The error code this error renders with.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Known { code, .. } => *code,
            Self::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            Self::Internal(_) | Self::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<diesel::result::Error> for AppError {
    /// Lost or unusable connections are connectivity failures of the store,
    /// everything else is a query error.
    fn from(err: diesel::result::Error) -> Self {
        match &err {
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand,
                info,
            ) => AppError::connectivity(format!("store connection lost: {}", info.message())),
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = code.status_code();
        let message = match &self {
            AppError::Known { message, .. } => {
                if status.is_server_error() {
                    tracing::error!(code = code.code(), error = %message, "request failed");
                }
                message.clone()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(diesel::result::Error::NotFound) => "resource not found".to_string(),
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "database error".to_string()
            }
        };

        (status, Json(ApiErrorResponse::new(code.code(), message))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

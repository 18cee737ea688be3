use axum::{response::IntoResponse, Json};

use crate::auth::AuthError;
use crate::comments::CommentError;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::InvalidStatus(status) => {
                (StatusCode::BAD_REQUEST, format!("invalid status: {status}"))
            }
            Self::InvalidCategory(category) => (
                StatusCode::BAD_REQUEST,
                format!("invalid category: {category}"),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for RequestError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => Self::Unauthorized("authentication required".to_string()),
            AuthError::Database(msg) => Self::Database(msg),
            AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<CommentError> for RequestError {
    fn from(e: CommentError) -> Self {
        match e {
            CommentError::NotFound => Self::NotFound("comment not found".to_string()),
            CommentError::Unauthorized => Self::Unauthorized("authentication required".to_string()),
            CommentError::Database(msg) => Self::Database(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<diesel::result::Error> for RequestError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

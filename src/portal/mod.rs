//! Portal surface: registration approval, profiles, departments and the
//! role-shaped dashboard.

pub mod dashboard;
pub mod departments;
pub mod profile;
pub mod registration;

use axum::{
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::auth::AuthError;
use crate::shared::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),
    #[error("duplicate department name: {0}")]
    DuplicateName(String),
    #[error("password mismatch")]
    PasswordMismatch,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for PortalError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match self {
            Self::DuplicateIdentity(msg) | Self::DuplicateName(msg) => {
                (StatusCode::CONFLICT, msg)
            }
            Self::PasswordMismatch => {
                (StatusCode::BAD_REQUEST, "Пароли не совпадают".to_string())
            }
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Database(msg) | Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for PortalError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => Self::Unauthorized("authentication required".to_string()),
            AuthError::Database(msg) => Self::Database(msg),
            AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<diesel::result::Error> for PortalError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/register", post(registration::handle_submit_registration))
        .route("/api/registrations", get(registration::handle_list_registrations))
        .route(
            "/api/registrations/:id/approve",
            post(registration::handle_approve_registration),
        )
        .route(
            "/api/registrations/:id/reject",
            post(registration::handle_reject_registration),
        )
        .route("/api/departments", get(departments::handle_list_departments))
        .route("/api/departments", post(departments::handle_create_department))
        .route("/api/profile", get(profile::handle_get_profile))
        .route("/api/profile", put(profile::handle_update_profile))
        .route("/api/profile/password", post(profile::handle_change_password))
        .route("/api/users/:id", delete(profile::handle_delete_user))
        .route("/api/dashboard", get(dashboard::handle_dashboard))
}

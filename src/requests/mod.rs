pub mod error;
pub mod handlers;
pub mod workflow;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use error::RequestError;
pub use handlers::*;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/requests", get(handle_list_requests))
        .route("/api/requests", post(handle_create_request))
        .route("/api/requests/ingest", post(handle_ingest_request))
        .route("/api/requests/:id", get(handle_get_request))
        .route("/api/requests/:id", delete(handle_delete_request))
        .route("/api/requests/:id/status", put(handle_change_status))
        .route("/api/requests/:id/comments", post(handle_add_request_comment))
}

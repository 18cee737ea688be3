//! Combines the per-module routers into the one API surface the server
//! exposes.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // ===== Health =====
        .route("/health", get(health_check))
        // ===== Knowledge Base =====
        .merge(crate::kb::configure())
        // ===== Support Requests =====
        .merge(crate::requests::configure())
        // ===== Comment Moderation =====
        .merge(crate::comments::configure())
        // ===== Portal: Registration, Profiles, Departments, Dashboard =====
        .merge(crate::portal::configure())
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state.conn.get().is_ok();
    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "portalserver",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Action};
use crate::notify::NotifyContext;
use crate::shared::models::{Comment, SupportRequest};
use crate::shared::state::AppState;

use super::error::RequestError;
use super::workflow::{self, NewRequest};

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestCommentPayload {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub sender: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub request: SupportRequest,
    pub comments: Vec<Comment>,
}

pub async fn handle_create_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<SupportRequest>, RequestError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let notify = NotifyContext::from_state(&state);

    let created = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;

        workflow::create_request(
            &mut conn,
            &notify,
            NewRequest {
                title: payload.title,
                description: payload.description,
                category: payload.category,
                status: payload.status,
                created_by: Some(actor.user.id),
            },
        )
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(created))
}

pub async fn handle_list_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<SupportRequest>>, RequestError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;

        workflow::list_requests(&mut conn, query.query, query.status)
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_get_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<RequestDetail>, RequestError> {
    let pool = state.conn.clone();

    let detail = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let (request, comments) = workflow::get_request(&mut conn, request_id)?;
        Ok::<RequestDetail, RequestError>(RequestDetail { request, comments })
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(detail))
}

pub async fn handle_change_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<StatusPayload>,
) -> Result<Json<SupportRequest>, RequestError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let notify = NotifyContext::from_state(&state);

    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::ChangeRequestStatus)?;

        workflow::change_status(&mut conn, &notify, request_id, &payload.status)
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(updated))
}

pub async fn handle_delete_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, RequestError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::DeleteRequest)?;

        workflow::delete_request(&mut conn, request_id)
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn handle_add_request_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<RequestCommentPayload>,
) -> Result<Json<Comment>, RequestError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let notify = NotifyContext::from_state(&state);

    let comment = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;

        workflow::add_comment(&mut conn, &notify, request_id, &actor.user, payload.text)
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(comment))
}

/// Entry point for the mail pipeline. No account stands behind these
/// tickets, so the route skips the usual identity header.
pub async fn handle_ingest_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestPayload>,
) -> Result<Json<SupportRequest>, RequestError> {
    let pool = state.conn.clone();
    let notify = NotifyContext::from_state(&state);

    let created = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| RequestError::Database(e.to_string()))?;

        workflow::ingest_email(
            &mut conn,
            &notify,
            &payload.subject,
            payload.body,
            payload.sender,
        )
    })
    .await
    .map_err(|e| RequestError::Internal(e.to_string()))??;

    Ok(Json(created))
}

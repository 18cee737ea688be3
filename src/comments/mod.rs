use crate::auth::{self, Action, AuthError};
use crate::shared::models::Comment;
use crate::shared::schema::comments;
use crate::shared::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::delete,
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment must be attached to an article or a request")]
    MissingParent,
    #[error("comment cannot belong to both an article and a request")]
    AmbiguousParent,
    #[error("authentication required")]
    Unauthorized,
    #[error("comment not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for CommentError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::MissingParent | Self::AmbiguousParent => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for CommentError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => CommentError::Unauthorized,
            AuthError::Database(msg) => CommentError::Database(msg),
            AuthError::Internal(msg) => CommentError::Internal(msg),
        }
    }
}

// ===== Attachment Rule =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentParent {
    Article(Uuid),
    Request(Uuid),
}

impl CommentParent {
    pub fn kind(&self) -> &'static str {
        match self {
            CommentParent::Article(_) => "article",
            CommentParent::Request(_) => "request",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CommentParent::Article(id) | CommentParent::Request(id) => *id,
        }
    }
}

/// A comment belongs to exactly one parent. Runs before every comment
/// write; there is no code path that persists one without this check.
pub fn validate_attachment(
    article_id: Option<Uuid>,
    request_id: Option<Uuid>,
) -> Result<CommentParent, CommentError> {
    match (article_id, request_id) {
        (None, None) => Err(CommentError::MissingParent),
        (Some(_), Some(_)) => Err(CommentError::AmbiguousParent),
        (Some(article), None) => Ok(CommentParent::Article(article)),
        (None, Some(request)) => Ok(CommentParent::Request(request)),
    }
}

fn parent_of(comment: &Comment) -> Option<CommentParent> {
    validate_attachment(comment.article_id, comment.request_id).ok()
}

/// Validates the attachment and persists the comment. The article and
/// request modules both write comments through here.
pub fn create(
    conn: &mut PgConnection,
    text: String,
    article_id: Option<Uuid>,
    request_id: Option<Uuid>,
    user_id: Uuid,
) -> Result<Comment, CommentError> {
    let parent = validate_attachment(article_id, request_id)?;
    let record = Comment {
        id: Uuid::new_v4(),
        text,
        article_id,
        request_id,
        user_id: Some(user_id),
        created_at: Utc::now(),
    };
    diesel::insert_into(comments::table)
        .values(&record)
        .execute(conn)
        .map_err(|e| CommentError::Database(e.to_string()))?;
    info!(
        "comment {} added to {} {}",
        record.id,
        parent.kind(),
        parent.id()
    );
    Ok(record)
}

// ===== Handlers =====

/// Comment removal is open to the comment's author and to moderators.
/// The response names the parent the comment hung off so callers can
/// refresh the right view.
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, CommentError> {
    let caller = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let (parent_kind, parent_id) = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| CommentError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, caller)?;
        let comment: Comment = comments::table
            .find(comment_id)
            .first(&mut conn)
            .optional()
            .map_err(|e| CommentError::Database(e.to_string()))?
            .ok_or(CommentError::NotFound)?;

        let is_author = comment.user_id == Some(actor.user.id);
        if !is_author && !actor.permitted(Action::ModerateComments) {
            return Err(CommentError::Unauthorized);
        }

        diesel::delete(comments::table.find(comment_id))
            .execute(&mut conn)
            .map_err(|e| CommentError::Database(e.to_string()))?;
        info!("comment {} deleted by {}", comment_id, actor.user.username);

        Ok::<_, CommentError>(match parent_of(&comment) {
            Some(parent) => (parent.kind(), Some(parent.id())),
            None => ("none", None),
        })
    })
    .await
    .map_err(|e| CommentError::Internal(e.to_string()))??;

    Ok(Json(serde_json::json!({
        "success": true,
        "parent": parent_kind,
        "parent_id": parent_id,
    })))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new().route("/api/comments/:id", delete(delete_comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_parent_is_rejected() {
        assert!(matches!(
            validate_attachment(None, None),
            Err(CommentError::MissingParent)
        ));
    }

    #[test]
    fn test_two_parents_are_rejected() {
        assert!(matches!(
            validate_attachment(Some(Uuid::new_v4()), Some(Uuid::new_v4())),
            Err(CommentError::AmbiguousParent)
        ));
    }

    #[test]
    fn test_single_parent_is_identified() {
        let article = Uuid::new_v4();
        let parent = validate_attachment(Some(article), None).unwrap();
        assert_eq!(parent, CommentParent::Article(article));
        assert_eq!(parent.kind(), "article");
        assert_eq!(parent.id(), article);

        let request = Uuid::new_v4();
        let parent = validate_attachment(None, Some(request)).unwrap();
        assert_eq!(parent, CommentParent::Request(request));
        assert_eq!(parent.kind(), "request");
    }

    #[test]
    fn test_parent_of_is_lenient_for_stored_rows() {
        let orphan = Comment {
            id: Uuid::new_v4(),
            text: "текст".to_string(),
            article_id: None,
            request_id: None,
            user_id: None,
            created_at: Utc::now(),
        };
        assert!(parent_of(&orphan).is_none());
    }
}

//! Knowledge base articles and their comment threads. Reading is open to
//! everyone; writing is reserved for the editorial roles.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Action, AuthError};
use crate::comments::{self, CommentError};
use crate::notify::{self, messages, NotifyContext};
use crate::shared::models::{Article, Comment, User};
use crate::shared::schema::{articles, comments as comments_table, users};
use crate::shared::state::AppState;
use crate::shared::utils::like_pattern;

#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ArticleError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for ArticleError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => Self::Unauthorized("authentication required".to_string()),
            AuthError::Database(msg) => Self::Database(msg),
            AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<CommentError> for ArticleError {
    fn from(e: CommentError) -> Self {
        match e {
            CommentError::NotFound => Self::NotFound("comment not found".to_string()),
            CommentError::Unauthorized => Self::Unauthorized("authentication required".to_string()),
            CommentError::Database(msg) => Self::Database(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<diesel::result::Error> for ArticleError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

/// Whitelisted orderings for the article list. Anything unrecognized
/// falls back to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArticleOrder {
    NewestFirst,
    OldestFirst,
    TitleAsc,
    TitleDesc,
}

fn parse_order(sort_by: Option<&str>) -> ArticleOrder {
    match sort_by {
        Some("pub_date") => ArticleOrder::OldestFirst,
        Some("title") => ArticleOrder::TitleAsc,
        Some("-title") => ArticleOrder::TitleDesc,
        _ => ArticleOrder::NewestFirst,
    }
}

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticlePayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleCommentPayload {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ArticleDetail {
    pub article: Article,
    pub comments: Vec<Comment>,
}

pub async fn handle_list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<Vec<Article>>, ArticleError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ArticleError::Database(e.to_string()))?;

        let mut db_query = articles::table.into_boxed();
        if let Some(search) = query.query.filter(|s| !s.is_empty()) {
            let term = like_pattern(&search);
            db_query = db_query.filter(
                articles::title
                    .ilike(term.clone())
                    .or(articles::content.ilike(term)),
            );
        }

        let db_query = match parse_order(query.sort_by.as_deref()) {
            ArticleOrder::NewestFirst => db_query.order(articles::pub_date.desc()),
            ArticleOrder::OldestFirst => db_query.order(articles::pub_date.asc()),
            ArticleOrder::TitleAsc => db_query.order(articles::title.asc()),
            ArticleOrder::TitleDesc => db_query.order(articles::title.desc()),
        };

        db_query
            .load::<Article>(&mut conn)
            .map_err(|e| ArticleError::Database(e.to_string()))
    })
    .await
    .map_err(|e| ArticleError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_create_article(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ArticlePayload>,
) -> Result<Json<Article>, ArticleError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let created = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ArticleError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::PublishArticle)?;

        let record = Article {
            id: Uuid::new_v4(),
            title: payload.title,
            content: payload.content,
            image: payload.image,
            video: payload.video,
            audio: payload.audio,
            author_id: Some(actor.user.id),
            pub_date: Utc::now(),
        };

        diesel::insert_into(articles::table)
            .values(&record)
            .execute(&mut conn)
            .map_err(|e| ArticleError::Database(e.to_string()))?;

        info!("article {} published by {}", record.id, actor.user.username);
        Ok::<Article, ArticleError>(record)
    })
    .await
    .map_err(|e| ArticleError::Internal(e.to_string()))??;

    Ok(Json(created))
}

pub async fn handle_get_article(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<ArticleDetail>, ArticleError> {
    let pool = state.conn.clone();

    let detail = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ArticleError::Database(e.to_string()))?;

        let article = load_article(&mut conn, article_id)?;
        let thread = comments_table::table
            .filter(comments_table::article_id.eq(article_id))
            .order(comments_table::created_at.asc())
            .load(&mut conn)
            .map_err(|e| ArticleError::Database(e.to_string()))?;

        Ok::<ArticleDetail, ArticleError>(ArticleDetail {
            article,
            comments: thread,
        })
    })
    .await
    .map_err(|e| ArticleError::Internal(e.to_string()))??;

    Ok(Json(detail))
}

pub async fn handle_update_article(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(article_id): Path<Uuid>,
    Json(payload): Json<ArticlePayload>,
) -> Result<Json<Article>, ArticleError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ArticleError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::EditArticle)?;

        let record = load_article(&mut conn, article_id)?;
        // Articles whose author account was removed get re-attributed to
        // whoever edits them next.
        let author_id = record.author_id.or(Some(actor.user.id));

        diesel::update(articles::table.find(article_id))
            .set((
                articles::title.eq(payload.title.clone()),
                articles::content.eq(payload.content.clone()),
                articles::image.eq(payload.image.clone()),
                articles::video.eq(payload.video.clone()),
                articles::audio.eq(payload.audio.clone()),
                articles::author_id.eq(author_id),
            ))
            .execute(&mut conn)
            .map_err(|e| ArticleError::Database(e.to_string()))?;

        Ok::<Article, ArticleError>(Article {
            title: payload.title,
            content: payload.content,
            image: payload.image,
            video: payload.video,
            audio: payload.audio,
            author_id,
            ..record
        })
    })
    .await
    .map_err(|e| ArticleError::Internal(e.to_string()))??;

    Ok(Json(updated))
}

pub async fn handle_delete_article(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(article_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ArticleError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ArticleError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::DeleteArticle)?;

        conn.transaction::<_, ArticleError, _>(|conn| {
            diesel::delete(
                comments_table::table.filter(comments_table::article_id.eq(article_id)),
            )
            .execute(conn)?;

            let deleted =
                diesel::delete(articles::table.find(article_id)).execute(conn)?;
            if deleted == 0 {
                return Err(ArticleError::NotFound(format!(
                    "article {article_id} not found"
                )));
            }
            Ok(())
        })?;

        info!("article {} deleted by {}", article_id, actor.user.username);
        Ok::<(), ArticleError>(())
    })
    .await
    .map_err(|e| ArticleError::Internal(e.to_string()))??;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn handle_add_article_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(article_id): Path<Uuid>,
    Json(payload): Json<ArticleCommentPayload>,
) -> Result<Json<Comment>, ArticleError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let ctx = NotifyContext::from_state(&state);

    let comment = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ArticleError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;

        let article = load_article(&mut conn, article_id)?;
        let comment =
            comments::create(&mut conn, payload.text, Some(article_id), None, actor.user.id)?;

        let author_email =
            notify::exclude_author(author_email(&mut conn, &article), &actor.user.email);
        let mail = messages::comment_on_article(
            &actor.user.full_name(),
            &comment.text,
            &article.title,
            article.id,
            &ctx.base_url,
        );
        let recipients =
            notify::dedup_recipients(vec![author_email, ctx.admin_email.clone()]);
        notify::best_effort(ctx.mailer.as_ref(), &mail.subject, &mail.body, &recipients);

        Ok::<Comment, ArticleError>(comment)
    })
    .await
    .map_err(|e| ArticleError::Internal(e.to_string()))??;

    Ok(Json(comment))
}

fn load_article(conn: &mut PgConnection, article_id: Uuid) -> Result<Article, ArticleError> {
    articles::table
        .find(article_id)
        .first(conn)
        .optional()
        .map_err(|e| ArticleError::Database(e.to_string()))?
        .ok_or_else(|| ArticleError::NotFound(format!("article {article_id} not found")))
}

/// Author address for notification mail. The comment this mail reports on
/// has already committed, so lookup failures are logged and treated as no
/// recipient.
fn author_email(conn: &mut PgConnection, article: &Article) -> Option<String> {
    let author_id = article.author_id?;
    match users::table.find(author_id).first::<User>(conn).optional() {
        Ok(author) => author.map(|u| u.email).filter(|email| !email.is_empty()),
        Err(e) => {
            warn!("author lookup for article {} failed: {}", article.id, e);
            None
        }
    }
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/articles", get(handle_list_articles))
        .route("/api/articles", post(handle_create_article))
        .route("/api/articles/:id", get(handle_get_article))
        .route("/api/articles/:id", put(handle_update_article))
        .route("/api/articles/:id", delete(handle_delete_article))
        .route("/api/articles/:id/comments", post(handle_add_article_comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_is_newest_first() {
        assert_eq!(parse_order(None), ArticleOrder::NewestFirst);
        assert_eq!(parse_order(Some("-pub_date")), ArticleOrder::NewestFirst);
    }

    #[test]
    fn test_recognized_sort_keys() {
        assert_eq!(parse_order(Some("pub_date")), ArticleOrder::OldestFirst);
        assert_eq!(parse_order(Some("title")), ArticleOrder::TitleAsc);
        assert_eq!(parse_order(Some("-title")), ArticleOrder::TitleDesc);
    }

    #[test]
    fn test_unknown_sort_key_falls_back_to_default() {
        assert_eq!(parse_order(Some("author")), ArticleOrder::NewestFirst);
        assert_eq!(parse_order(Some("")), ArticleOrder::NewestFirst);
    }

    #[test]
    fn test_article_payload_media_fields_are_optional() {
        let payload: ArticlePayload =
            serde_json::from_str(r#"{"title": "Регламент", "content": "Текст"}"#)
                .expect("payload should deserialize");
        assert!(payload.image.is_none());
        assert!(payload.video.is_none());
        assert!(payload.audio.is_none());
    }
}

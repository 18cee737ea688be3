//! Profile self-service plus the administrative account removal path.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Action};
use crate::notify::{messages, NotifyContext};
use crate::shared::models::{Role, UserProfile};
use crate::shared::schema::{
    articles, comments, departments, registration_requests, requests, user_profiles, users,
};
use crate::shared::state::AppState;

use super::PortalError;

#[derive(Debug, Deserialize)]
pub struct UpdateProfilePayload {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub position: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub phone: String,
    pub position: String,
}

/// Accounts approved before profiles existed get one lazily, with the
/// plain user role.
pub(crate) fn get_or_create_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<UserProfile, PortalError> {
    let existing: Option<UserProfile> = user_profiles::table
        .filter(user_profiles::user_id.eq(user_id))
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(e.to_string()))?;
    if let Some(profile) = existing {
        return Ok(profile);
    }

    let now = Utc::now();
    let profile = UserProfile {
        id: Uuid::new_v4(),
        user_id,
        role: Role::User.as_str().to_string(),
        department_id: None,
        phone: String::new(),
        position: String::new(),
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(user_profiles::table)
        .values(&profile)
        .execute(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    Ok(profile)
}

pub async fn handle_get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProfileView>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let view = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        let profile = get_or_create_profile(&mut conn, actor.user.id)?;

        Ok::<ProfileView, PortalError>(ProfileView {
            username: actor.user.username,
            first_name: actor.user.first_name,
            last_name: actor.user.last_name,
            email: actor.user.email,
            role: profile.role,
            department_id: profile.department_id,
            phone: profile.phone,
            position: profile.position,
        })
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(view))
}

pub async fn handle_update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let response = tokio::task::spawn_blocking(move || {
        if !payload.email.contains('@') {
            return Err(PortalError::Validation("Укажите корректный email".to_string()));
        }

        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;

        if let Some(department_id) = payload.department_id {
            let known: Option<Uuid> = departments::table
                .find(department_id)
                .select(departments::id)
                .first(&mut conn)
                .optional()
                .map_err(|e| PortalError::Database(e.to_string()))?;
            if known.is_none() {
                return Err(PortalError::Validation(
                    "Выбранный отдел не существует".to_string(),
                ));
            }
        }

        let profile = get_or_create_profile(&mut conn, actor.user.id)?;
        let now = Utc::now();
        conn.transaction::<(), diesel::result::Error, _>(|conn| {
            diesel::update(users::table.find(actor.user.id))
                .set((
                    users::first_name.eq(&payload.first_name),
                    users::last_name.eq(&payload.last_name),
                    users::email.eq(&payload.email),
                ))
                .execute(conn)?;
            diesel::update(user_profiles::table.find(profile.id))
                .set((
                    user_profiles::phone.eq(&payload.phone),
                    user_profiles::department_id.eq(payload.department_id),
                    user_profiles::position.eq(&payload.position),
                    user_profiles::updated_at.eq(now),
                ))
                .execute(conn)?;
            Ok(())
        })
        .map_err(map_profile_write_error)?;

        info!("profile updated for {}", actor.user.username);
        let view = ProfileView {
            username: actor.user.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            role: profile.role,
            department_id: payload.department_id,
            phone: payload.phone,
            position: payload.position,
        };
        Ok(json!({
            "message": "Профиль успешно обновлен.",
            "profile": view,
        }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let ctx = NotifyContext::from_state(&state);

    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;

        if !auth::verify_password(&payload.old_password, &actor.user.password_hash)? {
            return Err(PortalError::Validation(
                "Старый пароль введен неправильно".to_string(),
            ));
        }
        if payload.new_password1 != payload.new_password2 {
            return Err(PortalError::PasswordMismatch);
        }
        if payload.new_password1.chars().count() < 8 {
            return Err(PortalError::Validation(
                "Пароль должен содержать минимум 8 символов".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&payload.new_password1)?;
        diesel::update(users::table.find(actor.user.id))
            .set(users::password_hash.eq(password_hash))
            .execute(&mut conn)
            .map_err(|e| PortalError::Database(e.to_string()))?;

        info!("password changed for {}", actor.user.username);

        let message = if actor.user.email.is_empty() {
            "Пароль успешно изменен.".to_string()
        } else {
            let mail = messages::password_changed(&ctx.base_url);
            match ctx
                .mailer
                .send(&mail.subject, &mail.body, &[actor.user.email.clone()])
            {
                Ok(()) => "Пароль успешно изменен.".to_string(),
                Err(e) => {
                    warn!("password change mail for {} failed: {}", actor.user.username, e);
                    format!(
                        "Пароль изменен, но не удалось отправить email-уведомление: {}",
                        e
                    )
                }
            }
        };

        Ok(json!({ "message": message }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

pub async fn handle_delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::ManageUsers)?;

        let target: Option<Uuid> = users::table
            .find(user_id)
            .select(users::id)
            .first(&mut conn)
            .optional()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        if target.is_none() {
            return Err(PortalError::NotFound(format!("user {user_id} not found")));
        }

        // Authored content outlives the account. Ownership references are
        // cleared rather than cascading the delete.
        conn.transaction::<(), diesel::result::Error, _>(|conn| {
            diesel::update(articles::table.filter(articles::author_id.eq(user_id)))
                .set(articles::author_id.eq(None::<Uuid>))
                .execute(conn)?;
            diesel::update(requests::table.filter(requests::created_by.eq(user_id)))
                .set(requests::created_by.eq(None::<Uuid>))
                .execute(conn)?;
            diesel::update(comments::table.filter(comments::user_id.eq(user_id)))
                .set(comments::user_id.eq(None::<Uuid>))
                .execute(conn)?;
            diesel::update(
                registration_requests::table
                    .filter(registration_requests::reviewed_by.eq(user_id)),
            )
            .set(registration_requests::reviewed_by.eq(None::<Uuid>))
            .execute(conn)?;
            diesel::delete(user_profiles::table.filter(user_profiles::user_id.eq(user_id)))
                .execute(conn)?;
            diesel::delete(users::table.find(user_id)).execute(conn)?;
            Ok(())
        })?;

        info!("user {} deleted, authored content detached", user_id);
        Ok::<serde_json::Value, PortalError>(json!({ "success": true }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

/// The users table keeps email unique, so handing an address already held
/// by another account to the update is a conflict, not a server fault.
fn map_profile_write_error(e: diesel::result::Error) -> PortalError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            PortalError::DuplicateIdentity(
                "Пользователь с таким email уже существует".to_string(),
            )
        }
        other => PortalError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_payload_optional_fields_default() {
        let payload: UpdateProfilePayload =
            serde_json::from_str(r#"{ "email": "ivanova@example.com" }"#)
                .expect("payload should deserialize");
        assert!(payload.first_name.is_empty());
        assert!(payload.phone.is_empty());
        assert!(payload.department_id.is_none());
    }

    #[test]
    fn test_profile_view_keeps_role_as_plain_string() {
        let view = ProfileView {
            username: "petrov".to_string(),
            first_name: "Пётр".to_string(),
            last_name: "Петров".to_string(),
            email: "petrov@example.com".to_string(),
            role: "support".to_string(),
            department_id: None,
            phone: String::new(),
            position: "инженер".to_string(),
        };
        let rendered = serde_json::to_value(&view).expect("view should serialize");
        assert_eq!(rendered["role"], "support");
        assert_eq!(rendered["department_id"], serde_json::Value::Null);
    }

    #[test]
    fn test_duplicate_email_maps_to_duplicate_identity() {
        let unique = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        assert!(matches!(
            map_profile_write_error(unique),
            PortalError::DuplicateIdentity(_)
        ));
        assert!(matches!(
            map_profile_write_error(diesel::result::Error::NotFound),
            PortalError::Database(_)
        ));
    }
}

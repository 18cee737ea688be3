//! Registration approval workflow. Accounts are never self-provisioned:
//! a submission sits in the pending queue until a reviewer approves or
//! rejects it, and only approval creates the user record.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Action};
use crate::notify::{self, messages, NotifyContext};
use crate::shared::models::{RegistrationRequest, RegistrationStatus, Role, User, UserProfile};
use crate::shared::schema::{departments, registration_requests, user_profiles, users};
use crate::shared::state::AppState;

use super::PortalError;

#[derive(Debug, Deserialize)]
pub struct RegistrationPayload {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub requested_role: Option<String>,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct ListRegistrationsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectPayload {
    #[serde(default)]
    pub rejection_reason: String,
}

/// What reviewers see. The submitted credential stays out of every
/// response on purpose.
#[derive(Debug, Serialize)]
pub struct RegistrationView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub department_id: Option<Uuid>,
    pub position: String,
    pub requested_role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: String,
}

impl From<RegistrationRequest> for RegistrationView {
    fn from(record: RegistrationRequest) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            phone: record.phone,
            department_id: record.department_id,
            position: record.position,
            requested_role: record.requested_role,
            status: record.status,
            created_at: record.created_at,
            reviewed_at: record.reviewed_at,
            reviewed_by: record.reviewed_by,
            rejection_reason: record.rejection_reason,
        }
    }
}

pub async fn handle_submit_registration(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegistrationPayload>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let pool = state.conn.clone();
    let ctx = NotifyContext::from_state(&state);

    let response = tokio::task::spawn_blocking(move || {
        if payload.username.trim().is_empty() {
            return Err(PortalError::Validation(
                "Укажите имя пользователя".to_string(),
            ));
        }
        if !payload.email.contains('@') {
            return Err(PortalError::Validation("Укажите корректный email".to_string()));
        }
        if payload.password1 != payload.password2 {
            return Err(PortalError::PasswordMismatch);
        }
        if payload.password1.chars().count() < 8 {
            return Err(PortalError::Validation(
                "Пароль должен содержать минимум 8 символов".to_string(),
            ));
        }
        let role = match payload.requested_role.as_deref() {
            None | Some("") => Role::User,
            Some(raw) => Role::parse(raw)
                .ok_or_else(|| PortalError::Validation("Укажите корректную роль".to_string()))?,
        };

        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;

        if username_exists(&mut conn, &payload.username)? {
            return Err(PortalError::DuplicateIdentity(
                "Пользователь с таким именем уже существует".to_string(),
            ));
        }
        if email_exists(&mut conn, &payload.email)? {
            return Err(PortalError::DuplicateIdentity(
                "Пользователь с таким email уже существует".to_string(),
            ));
        }
        let pending_username: Option<Uuid> = registration_requests::table
            .filter(registration_requests::username.eq(&payload.username))
            .select(registration_requests::id)
            .first(&mut conn)
            .optional()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        if pending_username.is_some() {
            return Err(PortalError::DuplicateIdentity(
                "Запрос на регистрацию с таким именем пользователя уже существует".to_string(),
            ));
        }
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

        let record = RegistrationRequest {
            id: Uuid::new_v4(),
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone: payload.phone,
            department_id: payload.department_id,
            position: payload.position,
            requested_role: role.as_str().to_string(),
            status: RegistrationStatus::Pending.as_str().to_string(),
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: String::new(),
            credential: payload.password1,
        };

        diesel::insert_into(registration_requests::table)
            .values(&record)
            .execute(&mut conn)
            .map_err(|e| PortalError::Database(e.to_string()))?;

        info!(
            "registration request {} submitted for username {}",
            record.id, record.username
        );

        let mail = messages::registration_submitted(&record);
        let recipients = notify::dedup_recipients(vec![ctx.admin_email.clone()]);
        notify::best_effort(ctx.mailer.as_ref(), &mail.subject, &mail.body, &recipients);

        Ok(json!({
            "id": record.id,
            "message": "Ваш запрос на регистрацию отправлен на рассмотрение администратору. \
                        Вы получите уведомление по email после рассмотрения."
        }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

pub async fn handle_list_registrations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListRegistrationsQuery>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::ReviewRegistrations)?;

        let mut db_query = registration_requests::table.into_boxed();
        if let Some(status) = query.status.filter(|s| !s.is_empty()) {
            db_query = db_query.filter(registration_requests::status.eq(status));
        }
        let records: Vec<RegistrationRequest> = db_query
            .order(registration_requests::created_at.desc())
            .load(&mut conn)
            .map_err(|e| PortalError::Database(e.to_string()))?;

        let pending_count: i64 = registration_requests::table
            .filter(registration_requests::status.eq(RegistrationStatus::Pending.as_str()))
            .count()
            .get_result(&mut conn)
            .map_err(|e| PortalError::Database(e.to_string()))?;

        let views: Vec<RegistrationView> =
            records.into_iter().map(RegistrationView::from).collect();
        Ok::<serde_json::Value, PortalError>(json!({
            "requests": views,
            "pending_count": pending_count,
        }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

pub async fn handle_approve_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let ctx = NotifyContext::from_state(&state);

    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::ReviewRegistrations)?;

        let registration = load_pending(&mut conn, registration_id)?;

        // A user may have appeared since submission. The queue never
        // blocks on it: the entry flips to rejected with the reason on
        // record and no account is created.
        if username_exists(&mut conn, &registration.username)? {
            let reason = format!(
                "Пользователь с именем \"{}\" уже существует в системе.",
                registration.username
            );
            mark_rejected(&mut conn, registration.id, actor.user.id, &reason)?;
            return Ok(json!({
                "approved": false,
                "message": format!(
                    "Заявка автоматически отклонена: пользователь с именем \"{}\" уже существует.",
                    registration.username
                ),
            }));
        }
        if email_exists(&mut conn, &registration.email)? {
            let reason = format!(
                "Пользователь с email \"{}\" уже существует в системе.",
                registration.email
            );
            mark_rejected(&mut conn, registration.id, actor.user.id, &reason)?;
            return Ok(json!({
                "approved": false,
                "message": format!(
                    "Заявка автоматически отклонена: пользователь с email \"{}\" уже существует.",
                    registration.email
                ),
            }));
        }

        let role = Role::parse(&registration.requested_role).unwrap_or(Role::User);
        let submitted_credential = !registration.credential.is_empty();
        let password = if submitted_credential {
            registration.credential.clone()
        } else {
            auth::generate_password()
        };
        let password_hash = auth::hash_password(&password)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: registration.username.clone(),
            email: registration.email.clone(),
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            password_hash,
            is_staff: matches!(role, Role::Admin | Role::Moderator),
            is_superuser: false,
            is_active: true,
            date_joined: now,
        };
        let profile = UserProfile {
            id: Uuid::new_v4(),
            user_id: user.id,
            role: role.as_str().to_string(),
            department_id: registration.department_id,
            phone: registration.phone.clone(),
            position: registration.position.clone(),
            created_at: now,
            updated_at: now,
        };

        let outcome = conn.transaction::<(), diesel::result::Error, _>(|conn| {
            diesel::insert_into(users::table).values(&user).execute(conn)?;
            diesel::insert_into(user_profiles::table)
                .values(&profile)
                .execute(conn)?;
            diesel::update(registration_requests::table.find(registration.id))
                .set((
                    registration_requests::status.eq(RegistrationStatus::Approved.as_str()),
                    registration_requests::reviewed_by.eq(Some(actor.user.id)),
                    registration_requests::reviewed_at.eq(Some(now)),
                ))
                .execute(conn)?;
            Ok(())
        });

        match outcome {
            Ok(()) => {}
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                let reason = "Ошибка при создании пользователя: пользователь с таким \
                              именем или email уже существует.";
                mark_rejected(&mut conn, registration.id, actor.user.id, reason)?;
                return Ok(json!({
                    "approved": false,
                    "message": "Заявка автоматически отклонена: пользователь с таким \
                                именем или email уже существует.",
                }));
            }
            Err(e) => return Err(PortalError::Database(e.to_string())),
        }

        info!(
            "registration {} approved, user {} created with role {}",
            registration.id,
            user.username,
            role.as_str()
        );

        let message = if user.email.is_empty() {
            format!("Запрос одобрен. Пользователь {} создан.", user.username)
        } else {
            let password_line = if submitted_credential {
                messages::SUBMITTED_PASSWORD_LINE.to_string()
            } else {
                password.clone()
            };
            let mail = messages::registration_approved(&user.username, &password_line, &ctx.base_url);
            match ctx
                .mailer
                .send(&mail.subject, &mail.body, &[user.email.clone()])
            {
                Ok(()) => format!(
                    "Запрос одобрен. Пользователь {} создан. Email с данными для входа отправлен на {}.",
                    user.username, user.email
                ),
                Err(e) => {
                    warn!("approval mail for {} failed: {}", user.username, e);
                    format!(
                        "Запрос одобрен. Пользователь {} создан, но не удалось отправить email: {}.",
                        user.username, e
                    )
                }
            }
        };

        Ok(json!({
            "approved": true,
            "user_id": user.id,
            "message": message,
        }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

pub async fn handle_reject_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(registration_id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();
    let ctx = NotifyContext::from_state(&state);

    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::ReviewRegistrations)?;

        let registration = load_pending(&mut conn, registration_id)?;
        mark_rejected(
            &mut conn,
            registration.id,
            actor.user.id,
            &payload.rejection_reason,
        )?;

        if !registration.email.is_empty() {
            let mail = messages::registration_rejected(&payload.rejection_reason);
            notify::best_effort(
                ctx.mailer.as_ref(),
                &mail.subject,
                &mail.body,
                &[registration.email.clone()],
            );
        }

        info!("registration {} rejected", registration.id);
        Ok::<serde_json::Value, PortalError>(json!({ "message": "Запрос отклонен." }))
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(response))
}

fn load_pending(
    conn: &mut PgConnection,
    registration_id: Uuid,
) -> Result<RegistrationRequest, PortalError> {
    let registration: RegistrationRequest = registration_requests::table
        .find(registration_id)
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(e.to_string()))?
        .ok_or_else(|| {
            PortalError::NotFound(format!("registration {registration_id} not found"))
        })?;
    ensure_pending(&registration.status)?;
    Ok(registration)
}

/// Approved and rejected are terminal; a second review attempt is refused.
fn ensure_pending(status: &str) -> Result<(), PortalError> {
    if status != RegistrationStatus::Pending.as_str() {
        return Err(PortalError::InvalidState(format!(
            "registration is {}, not pending",
            status
        )));
    }
    Ok(())
}

fn mark_rejected(
    conn: &mut PgConnection,
    registration_id: Uuid,
    reviewer_id: Uuid,
    reason: &str,
) -> Result<(), PortalError> {
    diesel::update(registration_requests::table.find(registration_id))
        .set((
            registration_requests::status.eq(RegistrationStatus::Rejected.as_str()),
            registration_requests::reviewed_by.eq(Some(reviewer_id)),
            registration_requests::reviewed_at.eq(Some(Utc::now())),
            registration_requests::rejection_reason.eq(reason),
        ))
        .execute(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    Ok(())
}

fn username_exists(conn: &mut PgConnection, username: &str) -> Result<bool, PortalError> {
    let found: Option<Uuid> = users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(e.to_string()))?;
    Ok(found.is_some())
}

fn email_exists(conn: &mut PgConnection, email: &str) -> Result<bool, PortalError> {
    let found: Option<Uuid> = users::table
        .filter(users::email.eq(email))
        .select(users::id)
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(e.to_string()))?;
    Ok(found.is_some())
}

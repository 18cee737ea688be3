//! Role-shaped dashboard. Each audience gets its own payload: users see
//! their own activity, moderators the review queues, admins the totals,
//! support the active ticket list.

use axum::{extract::State, http::HeaderMap, Json};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth;
use crate::shared::models::{
    Comment, RegistrationRequest, RegistrationStatus, RequestStatus, Role, SupportRequest,
};
use crate::shared::schema::{
    articles, comments, registration_requests, requests, user_profiles, users,
};
use crate::shared::state::AppState;

use super::profile::get_or_create_profile;
use super::registration::RegistrationView;
use super::PortalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DashboardKind {
    User,
    Moderator,
    Admin,
    Support,
}

/// The profile role picks the dashboard; the superuser flag only matters
/// for accounts whose role is neither user nor moderator.
fn resolve_dashboard(role: Role, is_superuser: bool) -> DashboardKind {
    if role == Role::User {
        DashboardKind::User
    } else if role == Role::Moderator {
        DashboardKind::Moderator
    } else if role == Role::Admin || is_superuser {
        DashboardKind::Admin
    } else {
        DashboardKind::Support
    }
}

pub async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let payload = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        let profile = get_or_create_profile(&mut conn, actor.user.id)?;
        let role = Role::parse(&profile.role).unwrap_or(Role::User);

        let payload = match resolve_dashboard(role, actor.user.is_superuser) {
            DashboardKind::User => user_dashboard(&mut conn, actor.user.id)?,
            DashboardKind::Moderator => moderator_dashboard(&mut conn)?,
            DashboardKind::Admin => admin_dashboard(&mut conn)?,
            DashboardKind::Support => support_dashboard(&mut conn)?,
        };
        Ok::<serde_json::Value, PortalError>(payload)
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(payload))
}

fn user_dashboard(conn: &mut PgConnection, user_id: Uuid) -> Result<serde_json::Value, PortalError> {
    let my_requests: Vec<SupportRequest> = requests::table
        .filter(requests::created_by.eq(user_id))
        .order(requests::created_at.desc())
        .limit(5)
        .load(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    let my_requests_count: i64 = requests::table
        .filter(requests::created_by.eq(user_id))
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    let my_comments: Vec<Comment> = comments::table
        .filter(comments::user_id.eq(user_id))
        .order(comments::created_at.asc())
        .limit(5)
        .load(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;

    Ok(json!({
        "role": "user",
        "my_requests": my_requests,
        "my_requests_count": my_requests_count,
        "my_comments": my_comments,
    }))
}

fn moderator_dashboard(conn: &mut PgConnection) -> Result<serde_json::Value, PortalError> {
    let pending_requests: Vec<SupportRequest> = requests::table
        .filter(requests::status.eq(RequestStatus::New.as_str()))
        .order(requests::created_at.desc())
        .limit(10)
        .load(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    let pending_registrations: Vec<RegistrationView> = registration_requests::table
        .filter(registration_requests::status.eq(RegistrationStatus::Pending.as_str()))
        .order(registration_requests::created_at.desc())
        .limit(5)
        .load::<RegistrationRequest>(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?
        .into_iter()
        .map(RegistrationView::from)
        .collect();
    let total_requests: i64 = requests::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    let total_articles: i64 = articles::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;

    Ok(json!({
        "role": "moderator",
        "pending_requests": pending_requests,
        "pending_registrations": pending_registrations,
        "total_requests": total_requests,
        "total_articles": total_articles,
    }))
}

fn admin_dashboard(conn: &mut PgConnection) -> Result<serde_json::Value, PortalError> {
    let pending_registrations: Vec<RegistrationView> = registration_requests::table
        .filter(registration_requests::status.eq(RegistrationStatus::Pending.as_str()))
        .order(registration_requests::created_at.desc())
        .load::<RegistrationRequest>(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?
        .into_iter()
        .map(RegistrationView::from)
        .collect();
    let total_users: i64 = users::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    let total_requests: i64 = requests::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;
    let total_articles: i64 = articles::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;

    let requests_by_status: Vec<serde_json::Value> = requests::table
        .group_by(requests::status)
        .select((requests::status, count_star()))
        .load::<(String, i64)>(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();
    let users_by_role: Vec<serde_json::Value> = user_profiles::table
        .group_by(user_profiles::role)
        .select((user_profiles::role, count_star()))
        .load::<(String, i64)>(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?
        .into_iter()
        .map(|(role, count)| json!({ "role": role, "count": count }))
        .collect();

    Ok(json!({
        "role": "admin",
        "pending_registrations": pending_registrations,
        "total_users": total_users,
        "total_requests": total_requests,
        "total_articles": total_articles,
        "requests_by_status": requests_by_status,
        "users_by_role": users_by_role,
    }))
}

fn support_dashboard(conn: &mut PgConnection) -> Result<serde_json::Value, PortalError> {
    let active_requests: Vec<SupportRequest> = requests::table
        .filter(requests::status.eq_any([
            RequestStatus::New.as_str(),
            RequestStatus::InProgress.as_str(),
        ]))
        .order(requests::created_at.desc())
        .limit(10)
        .load(conn)
        .map_err(|e| PortalError::Database(e.to_string()))?;

    Ok(json!({
        "role": "support",
        "active_requests": active_requests,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_picks_dashboard() {
        assert_eq!(resolve_dashboard(Role::User, false), DashboardKind::User);
        assert_eq!(
            resolve_dashboard(Role::Moderator, false),
            DashboardKind::Moderator
        );
        assert_eq!(resolve_dashboard(Role::Admin, false), DashboardKind::Admin);
        assert_eq!(resolve_dashboard(Role::Support, false), DashboardKind::Support);
    }

    #[test]
    fn test_superuser_flag_upgrades_support_but_not_user() {
        assert_eq!(resolve_dashboard(Role::Support, true), DashboardKind::Admin);
        assert_eq!(resolve_dashboard(Role::User, true), DashboardKind::User);
        assert_eq!(
            resolve_dashboard(Role::Moderator, true),
            DashboardKind::Moderator
        );
    }
}

use crate::shared::models::{Role, User};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::HeaderMap;
use diesel::prelude::*;
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use uuid::Uuid;

/// Identity header injected by the fronting auth layer. Session handling
/// lives there; this service only trusts the forwarded user id.
pub const USER_ID_HEADER: &str = "x-user-id";

const GENERATED_PASSWORD_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthorized,
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<diesel::result::Error> for AuthError {
    fn from(e: diesel::result::Error) -> Self {
        AuthError::Database(e.to_string())
    }
}

// ===== Actions and the Permission Matrix =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PublishArticle,
    EditArticle,
    DeleteArticle,
    ChangeRequestStatus,
    DeleteRequest,
    ModerateComments,
    ReviewRegistrations,
    ManageDepartments,
    ManageUsers,
}

/// The single permission decision point. Every privileged handler funnels
/// through here so the role/flag interplay stays in one place.
pub fn permitted(role: Role, is_staff: bool, is_superuser: bool, action: Action) -> bool {
    let admin_tier = role == Role::Admin || is_superuser;
    let moderator_tier = admin_tier || role == Role::Moderator || is_staff;
    let support_tier =
        matches!(role, Role::Admin | Role::Moderator | Role::Support) || is_superuser;
    match action {
        Action::PublishArticle
        | Action::EditArticle
        | Action::DeleteArticle
        | Action::ModerateComments => moderator_tier,
        Action::ChangeRequestStatus => support_tier,
        Action::DeleteRequest
        | Action::ReviewRegistrations
        | Action::ManageDepartments
        | Action::ManageUsers => admin_tier,
    }
}

// ===== Actor =====

/// Authenticated caller: the user record plus the profile role, defaulting
/// to plain user when no profile row exists yet.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub role: Role,
}

impl Actor {
    pub fn permitted(&self, action: Action) -> bool {
        permitted(self.role, self.user.is_staff, self.user.is_superuser, action)
    }

    pub fn require(&self, action: Action) -> Result<(), AuthError> {
        if self.permitted(action) {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}

/// Pulls the caller id out of the forwarded identity header.
pub fn actor_id(headers: &HeaderMap) -> Result<Uuid, AuthError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;
    Uuid::parse_str(raw).map_err(|_| AuthError::Unauthorized)
}

/// Resolves the forwarded id against the user table. Unknown and
/// deactivated accounts are treated the same as a missing identity.
pub fn load_actor(conn: &mut PgConnection, id: Uuid) -> Result<Actor, AuthError> {
    use crate::shared::schema::{user_profiles, users};

    let user = users::table
        .find(id)
        .first::<User>(conn)
        .optional()?
        .ok_or(AuthError::Unauthorized)?;
    if !user.is_active {
        return Err(AuthError::Unauthorized);
    }
    let role = user_profiles::table
        .filter(user_profiles::user_id.eq(id))
        .select(user_profiles::role)
        .first::<String>(conn)
        .optional()?
        .and_then(|value| Role::parse(&value))
        .unwrap_or(Role::User);
    Ok(Actor { user, role })
}

// ===== Passwords =====

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("stored hash unreadable: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Internal(e.to_string())),
    }
}

/// Fallback credential for approved registrations that arrived without one.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_plain_user_has_no_privileges() {
        for action in [
            Action::PublishArticle,
            Action::EditArticle,
            Action::DeleteArticle,
            Action::ChangeRequestStatus,
            Action::DeleteRequest,
            Action::ModerateComments,
            Action::ReviewRegistrations,
            Action::ManageDepartments,
            Action::ManageUsers,
        ] {
            assert!(!permitted(Role::User, false, false, action));
        }
    }

    #[test]
    fn test_support_changes_status_and_nothing_else() {
        assert!(permitted(Role::Support, false, false, Action::ChangeRequestStatus));
        assert!(!permitted(Role::Support, false, false, Action::PublishArticle));
        assert!(!permitted(Role::Support, false, false, Action::DeleteRequest));
        assert!(!permitted(Role::Support, false, false, Action::ReviewRegistrations));
    }

    #[test]
    fn test_moderator_covers_articles_and_status() {
        assert!(permitted(Role::Moderator, false, false, Action::PublishArticle));
        assert!(permitted(Role::Moderator, false, false, Action::DeleteArticle));
        assert!(permitted(Role::Moderator, false, false, Action::ModerateComments));
        assert!(permitted(Role::Moderator, false, false, Action::ChangeRequestStatus));
        assert!(!permitted(Role::Moderator, false, false, Action::DeleteRequest));
        assert!(!permitted(Role::Moderator, false, false, Action::ReviewRegistrations));
    }

    #[test]
    fn test_admin_role_and_superuser_flag_cover_everything() {
        for action in [
            Action::PublishArticle,
            Action::ChangeRequestStatus,
            Action::DeleteRequest,
            Action::ReviewRegistrations,
            Action::ManageDepartments,
            Action::ManageUsers,
        ] {
            assert!(permitted(Role::Admin, false, false, action));
            assert!(permitted(Role::User, false, true, action));
        }
    }

    #[test]
    fn test_staff_flag_grants_moderation_but_not_status_changes() {
        assert!(permitted(Role::User, true, false, Action::PublishArticle));
        assert!(permitted(Role::User, true, false, Action::ModerateComments));
        assert!(!permitted(Role::User, true, false, Action::ChangeRequestStatus));
        assert!(!permitted(Role::User, true, false, Action::ReviewRegistrations));
    }

    #[test]
    fn test_actor_id_header_parsing() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(actor_id(&headers).unwrap(), id);

        let mut bad = HeaderMap::new();
        bad.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(actor_id(&bad), Err(AuthError::Unauthorized)));
        assert!(matches!(actor_id(&HeaderMap::new()), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("орёл-и-решка-8").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("орёл-и-решка-8", &hash).unwrap());
        assert!(!verify_password("другой-пароль", &hash).unwrap());
    }

    #[test]
    fn test_generated_password_is_sixteen_alphanumeric_chars() {
        let password = generate_password();
        assert_eq!(password.len(), 16);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

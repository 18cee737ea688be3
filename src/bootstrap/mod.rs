//! One-shot provisioning commands: the built-in superuser account and the
//! fixed department list. Both are idempotent and safe to re-run.

use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use uuid::Uuid;

use crate::auth;
use crate::shared::models::{Department, Role, User, UserProfile};
use crate::shared::schema::{departments, user_profiles, users};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

const DEFAULT_DEPARTMENTS: [&str; 7] = [
    "Научный отдел",
    "Отдел технической поддержки",
    "Отдел проектирования",
    "Отдел кадров",
    "Юридический отдел",
    "Отдел бухгалтерии",
    "Отдел продаж",
];

/// Creates the `admin` superuser, or resets its credentials and flags if
/// the account already exists. The profile gets the admin role so the
/// account lands on the admin dashboard, not just the superuser bypass.
pub fn ensure_admin(conn: &mut PgConnection, admin_email: Option<&str>) -> Result<()> {
    let email = admin_email
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_ADMIN_EMAIL);
    let password_hash = auth::hash_password(ADMIN_PASSWORD)?;

    let existing: Option<User> = users::table
        .filter(users::username.eq(ADMIN_USERNAME))
        .first(conn)
        .optional()?;

    let user_id = match existing {
        Some(user) => {
            diesel::update(users::table.find(user.id))
                .set((
                    users::password_hash.eq(&password_hash),
                    users::email.eq(email),
                    users::is_superuser.eq(true),
                    users::is_staff.eq(true),
                    users::is_active.eq(true),
                ))
                .execute(conn)?;
            info!("admin account already exists, credentials reset");
            user.id
        }
        None => {
            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                username: ADMIN_USERNAME.to_string(),
                email: email.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash,
                is_staff: true,
                is_superuser: true,
                is_active: true,
                date_joined: now,
            };
            diesel::insert_into(users::table).values(&user).execute(conn)?;
            info!("admin account created");
            user.id
        }
    };

    let profile: Option<UserProfile> = user_profiles::table
        .filter(user_profiles::user_id.eq(user_id))
        .first(conn)
        .optional()?;
    match profile {
        Some(profile) => {
            diesel::update(user_profiles::table.find(profile.id))
                .set((
                    user_profiles::role.eq(Role::Admin.as_str()),
                    user_profiles::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
        }
        None => {
            let now = Utc::now();
            let profile = UserProfile {
                id: Uuid::new_v4(),
                user_id,
                role: Role::Admin.as_str().to_string(),
                department_id: None,
                phone: String::new(),
                position: String::new(),
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(user_profiles::table)
                .values(&profile)
                .execute(conn)?;
        }
    }

    Ok(())
}

/// Get-or-create for the company department list.
pub fn seed_departments(conn: &mut PgConnection) -> Result<()> {
    let mut created = 0;
    for name in DEFAULT_DEPARTMENTS {
        let existing: Option<Uuid> = departments::table
            .filter(departments::name.eq(name))
            .select(departments::id)
            .first(conn)
            .optional()?;
        if existing.is_some() {
            info!("department already exists: {}", name);
            continue;
        }
        let record = Department {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            created_at: Utc::now(),
        };
        diesel::insert_into(departments::table)
            .values(&record)
            .execute(conn)?;
        info!("department created: {}", name);
        created += 1;
    }
    info!(
        "department seeding done, {} of {} created",
        created,
        DEFAULT_DEPARTMENTS.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_departments_are_unique() {
        let mut names: Vec<&str> = DEFAULT_DEPARTMENTS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DEFAULT_DEPARTMENTS.len());
    }
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::shared::schema::{
    articles, comments, departments, registration_requests, requests, user_profiles, users,
};

// ===== Domain Enums =====
//
// Records store the wire strings below verbatim; the enums exist so that
// every write goes through a validated value. `display_ru` carries the
// user-facing labels used in notification mails.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::New,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "New",
            RequestStatus::InProgress => "In Progress",
            RequestStatus::Completed => "Completed",
            RequestStatus::Cancelled => "Cancelled",
        }
    }

    pub fn display_ru(&self) -> &'static str {
        match self {
            RequestStatus::New => "Новая",
            RequestStatus::InProgress => "В работе",
            RequestStatus::Completed => "Завершена",
            RequestStatus::Cancelled => "Отменена",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCategory {
    Technical,
    Content,
    Other,
    Uncategorized,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 4] = [
        RequestCategory::Technical,
        RequestCategory::Content,
        RequestCategory::Other,
        RequestCategory::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Technical => "Technical",
            RequestCategory::Content => "Content",
            RequestCategory::Other => "Other",
            RequestCategory::Uncategorized => "Uncategorized",
        }
    }

    pub fn display_ru(&self) -> &'static str {
        match self {
            RequestCategory::Technical => "Техническая",
            RequestCategory::Content => "Контент",
            RequestCategory::Other => "Другое",
            RequestCategory::Uncategorized => "Без категории",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
    Support,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Moderator, Role::Admin, Role::Support];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Support => "support",
        }
    }

    pub fn display_ru(&self) -> &'static str {
        match self {
            Role::User => "Пользователь",
            Role::Moderator => "Модератор",
            Role::Admin => "Администратор",
            Role::Support => "Служба поддержки",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 3] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory team label derived from a request category. Computed and logged,
/// never persisted and never used for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLabel {
    Support,
    Moderator,
    Admin,
}

impl GroupLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLabel::Support => "support",
            GroupLabel::Moderator => "moderator",
            GroupLabel::Admin => "admin",
        }
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Records =====

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// First/last name when present, username otherwise.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = user_profiles)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub phone: String,
    pub position: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = registration_requests)]
pub struct RegistrationRequest {
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
    /// Submitted password held only until the registration is reviewed; the
    /// provisioned account stores an argon2 hash, never this value.
    pub credential: String,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = articles)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub author_id: Option<Uuid>,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = requests)]
pub struct SupportRequest {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub article_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_strings_round_trip() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(
            RequestStatus::parse("In Progress"),
            Some(RequestStatus::InProgress)
        );
        assert_eq!(RequestStatus::parse("in progress"), None);
        assert_eq!(RequestStatus::parse("Open"), None);
    }

    #[test]
    fn test_status_serde_matches_wire_strings() {
        let json = serde_json::to_string(&RequestStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let back: RequestStatus = serde_json::from_str("\"Cancelled\"").unwrap();
        assert_eq!(back, RequestStatus::Cancelled);
    }

    #[test]
    fn test_category_parse() {
        for category in RequestCategory::ALL {
            assert_eq!(RequestCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(RequestCategory::parse("technical"), None);
    }

    #[test]
    fn test_role_and_registration_status_strings() {
        assert_eq!(Role::parse("support"), Some(Role::Support));
        assert_eq!(Role::Support.display_ru(), "Служба поддержки");
        assert_eq!(
            RegistrationStatus::parse("pending"),
            Some(RegistrationStatus::Pending)
        );
        assert_eq!(RegistrationStatus::parse("Pending"), None);
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut user = User {
            id: Uuid::new_v4(),
            username: "ivanov".to_string(),
            email: "ivanov@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: Utc::now(),
        };
        assert_eq!(user.full_name(), "ivanov");
        user.first_name = "Иван".to_string();
        assert_eq!(user.full_name(), "Иван");
        user.last_name = "Иванов".to_string();
        assert_eq!(user.full_name(), "Иван Иванов");
    }
}

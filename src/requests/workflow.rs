//! Ticket lifecycle: creation with keyword classification, status
//! transitions, comments and removal. Mail goes out after the database
//! write succeeds and never fails the operation itself.

use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use uuid::Uuid;

use crate::classify;
use crate::comments;
use crate::notify::{self, messages, NotifyContext};
use crate::shared::models::{Comment, RequestCategory, RequestStatus, SupportRequest, User};
use crate::shared::schema::{requests, users};
use crate::shared::utils::{like_pattern, truncate_chars};

use super::error::RequestError;

/// Maximum title length for tickets lifted out of inbound mail.
const MAIL_TITLE_LIMIT: usize = 255;

pub struct NewRequest {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Picks the category for a new ticket. A submitted value wins as long as
/// it names a real category other than the unclassified bucket; absent or
/// unclassified input hands the decision to the keyword classifier, and a
/// value outside the set is refused rather than coerced.
fn resolve_category(
    supplied: Option<&str>,
    title: &str,
    description: &str,
) -> Result<RequestCategory, RequestError> {
    match supplied {
        None | Some("") => Ok(classify::classify(title, description)),
        Some(raw) => match RequestCategory::parse(raw) {
            Some(RequestCategory::Uncategorized) => Ok(classify::classify(title, description)),
            Some(chosen) => Ok(chosen),
            None => Err(RequestError::InvalidCategory(raw.to_string())),
        },
    }
}

/// Picks the opening status. Tickets start at `New` unless the creator
/// names another of the four statuses outright; a value outside the set
/// is refused rather than coerced.
fn resolve_status(supplied: Option<&str>) -> Result<RequestStatus, RequestError> {
    match supplied {
        None => Ok(RequestStatus::New),
        Some(raw) => {
            RequestStatus::parse(raw).ok_or_else(|| RequestError::InvalidStatus(raw.to_string()))
        }
    }
}

/// Creates a ticket and notifies the admin address.
pub fn create_request(
    conn: &mut PgConnection,
    notify: &NotifyContext,
    new_request: NewRequest,
) -> Result<SupportRequest, RequestError> {
    let category = resolve_category(
        new_request.category.as_deref(),
        &new_request.title,
        &new_request.description,
    )?;
    let status = resolve_status(new_request.status.as_deref())?;

    let now = Utc::now();
    let record = SupportRequest {
        id: Uuid::new_v4(),
        title: new_request.title,
        description: new_request.description,
        category: category.as_str().to_string(),
        status: status.as_str().to_string(),
        created_by: new_request.created_by,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(requests::table)
        .values(&record)
        .execute(conn)
        .map_err(|e| RequestError::Database(e.to_string()))?;

    let group = classify::resolve_group(category);
    info!(
        "request {} classified as {}, routed to the {} group",
        record.id,
        category.as_str(),
        group.as_str()
    );

    let mail = messages::request_created(&record, &notify.base_url);
    let recipients = notify::dedup_recipients(vec![notify.admin_email.clone()]);
    notify::best_effort(notify.mailer.as_ref(), &mail.subject, &mail.body, &recipients);

    Ok(record)
}

/// Moves a ticket to a new status and tells the creator and the admin.
/// The ticket must exist before the status value is even looked at, so a
/// bad status on a missing ticket still reads as not found.
pub fn change_status(
    conn: &mut PgConnection,
    notify: &NotifyContext,
    request_id: Uuid,
    new_status: &str,
) -> Result<SupportRequest, RequestError> {
    let mut record = load_request(conn, request_id)?;

    let status = RequestStatus::parse(new_status)
        .ok_or_else(|| RequestError::InvalidStatus(new_status.to_string()))?;

    let old_status = record.status.clone();
    let now = Utc::now();
    diesel::update(requests::table.find(request_id))
        .set((
            requests::status.eq(status.as_str()),
            requests::updated_at.eq(now),
        ))
        .execute(conn)
        .map_err(|e| RequestError::Database(e.to_string()))?;

    record.status = status.as_str().to_string();
    record.updated_at = now;

    let creator_email = creator_email(conn, &record);
    let mail =
        messages::request_status_changed(&record, &old_status, status.as_str(), &notify.base_url);
    let recipients = notify::dedup_recipients(vec![creator_email, notify.admin_email.clone()]);
    notify::best_effort(notify.mailer.as_ref(), &mail.subject, &mail.body, &recipients);

    Ok(record)
}

/// Attaches a comment to a ticket. The ticket creator hears about it
/// unless they wrote it themselves; the admin address always does.
pub fn add_comment(
    conn: &mut PgConnection,
    notify: &NotifyContext,
    request_id: Uuid,
    author: &User,
    text: String,
) -> Result<Comment, RequestError> {
    let record = load_request(conn, request_id)?;

    let comment = comments::create(conn, text, None, Some(request_id), author.id)?;

    let creator_email = notify::exclude_author(creator_email(conn, &record), &author.email);
    let mail = messages::comment_on_request(
        &author.full_name(),
        &comment.text,
        &record.title,
        record.id,
        &notify.base_url,
    );
    let recipients = notify::dedup_recipients(vec![creator_email, notify.admin_email.clone()]);
    notify::best_effort(notify.mailer.as_ref(), &mail.subject, &mail.body, &recipients);

    Ok(comment)
}

/// Removes a ticket together with its comments.
pub fn delete_request(conn: &mut PgConnection, request_id: Uuid) -> Result<(), RequestError> {
    use crate::shared::schema::comments as comments_table;

    conn.transaction::<_, RequestError, _>(|conn| {
        diesel::delete(
            comments_table::table.filter(comments_table::request_id.eq(request_id)),
        )
        .execute(conn)?;

        let deleted = diesel::delete(requests::table.find(request_id)).execute(conn)?;
        if deleted == 0 {
            return Err(RequestError::NotFound(format!(
                "request {request_id} not found"
            )));
        }
        Ok(())
    })?;

    info!("request {} deleted", request_id);
    Ok(())
}

/// Turns an inbound mail message into a ticket. The subject becomes the
/// title, the body the description, and the classifier picks the
/// category. Nobody is recorded as the creator.
pub fn ingest_email(
    conn: &mut PgConnection,
    notify: &NotifyContext,
    subject: &str,
    body: String,
    sender: Option<String>,
) -> Result<SupportRequest, RequestError> {
    let title = truncate_chars(subject, MAIL_TITLE_LIMIT).to_string();
    info!(
        "mail ticket from {}: {}",
        sender.as_deref().unwrap_or("unknown sender"),
        title
    );

    create_request(
        conn,
        notify,
        NewRequest {
            title,
            description: body,
            category: None,
            status: None,
            created_by: None,
        },
    )
}

/// Lists tickets, newest first, optionally narrowed by a case-insensitive
/// search over title and description and by an exact status value.
pub fn list_requests(
    conn: &mut PgConnection,
    search: Option<String>,
    status: Option<String>,
) -> Result<Vec<SupportRequest>, RequestError> {
    let mut query = requests::table.into_boxed();

    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let term = like_pattern(&search);
        query = query.filter(
            requests::title
                .ilike(term.clone())
                .or(requests::description.ilike(term)),
        );
    }

    if let Some(status) = status.filter(|s| !s.is_empty()) {
        query = query.filter(requests::status.eq(status));
    }

    query
        .order(requests::created_at.desc())
        .load(conn)
        .map_err(|e| RequestError::Database(e.to_string()))
}

/// Fetches one ticket and its comments, oldest comment first.
pub fn get_request(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> Result<(SupportRequest, Vec<Comment>), RequestError> {
    use crate::shared::schema::comments as comments_table;

    let record = load_request(conn, request_id)?;
    let thread = comments_table::table
        .filter(comments_table::request_id.eq(request_id))
        .order(comments_table::created_at.asc())
        .load(conn)
        .map_err(|e| RequestError::Database(e.to_string()))?;

    Ok((record, thread))
}

fn load_request(conn: &mut PgConnection, request_id: Uuid) -> Result<SupportRequest, RequestError> {
    requests::table
        .find(request_id)
        .first(conn)
        .optional()
        .map_err(|e| RequestError::Database(e.to_string()))?
        .ok_or_else(|| RequestError::NotFound(format!("request {request_id} not found")))
}

/// Creator address for notification mail. The write this mail reports on
/// has already committed, so lookup failures are logged and treated as no
/// recipient.
fn creator_email(conn: &mut PgConnection, record: &SupportRequest) -> Option<String> {
    let creator_id = record.created_by?;
    match users::table.find(creator_id).first::<User>(conn).optional() {
        Ok(creator) => creator.map(|u| u.email).filter(|email| !email.is_empty()),
        Err(e) => {
            warn!("creator lookup for request {} failed: {}", record.id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_category_wins_over_keywords() {
        let category = resolve_category(
            Some("Content"),
            "Сломался сервер",
            "Ошибка, система не работает",
        )
        .unwrap();
        assert_eq!(category, RequestCategory::Content);
    }

    #[test]
    fn test_uncategorized_submission_is_reclassified() {
        let category = resolve_category(
            Some("Uncategorized"),
            "Не работает принтер",
            "Выдает ошибку при печати",
        )
        .unwrap();
        assert_eq!(category, RequestCategory::Technical);
    }

    #[test]
    fn test_unknown_category_value_is_refused() {
        let err = resolve_category(Some("Hardware"), "Не работает сервер", "Ошибка подключения")
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidCategory(raw) if raw == "Hardware"));
    }

    #[test]
    fn test_missing_category_falls_back_to_classifier() {
        assert_eq!(
            resolve_category(None, "Вопрос по отпуску", "Сколько дней осталось?").unwrap(),
            RequestCategory::Uncategorized
        );
        assert_eq!(
            resolve_category(Some(""), "Вопрос по отпуску", "Сколько дней осталось?").unwrap(),
            RequestCategory::Uncategorized
        );
    }

    #[test]
    fn test_status_defaults_to_new() {
        assert_eq!(resolve_status(None).unwrap(), RequestStatus::New);
    }

    #[test]
    fn test_explicit_valid_status_is_honored() {
        assert_eq!(
            resolve_status(Some("In Progress")).unwrap(),
            RequestStatus::InProgress
        );
    }

    #[test]
    fn test_unknown_status_is_refused() {
        let err = resolve_status(Some("Done")).unwrap_err();
        assert!(matches!(err, RequestError::InvalidStatus(raw) if raw == "Done"));
    }

    #[test]
    fn test_mail_subject_truncates_at_limit_in_chars() {
        let subject = "ф".repeat(300);
        let title = truncate_chars(&subject, MAIL_TITLE_LIMIT);
        assert_eq!(title.chars().count(), MAIL_TITLE_LIMIT);
        assert!(subject.starts_with(title));
    }
}

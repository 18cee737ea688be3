//! Notification texts. Wording and layout follow the portal's established
//! Russian copy; changing them silently breaks downstream mail filters.

use crate::shared::models::{
    RegistrationRequest, RequestCategory, RequestStatus, Role, SupportRequest,
};
use crate::shared::utils::truncate_chars;
use uuid::Uuid;

pub struct MailText {
    pub subject: String,
    pub body: String,
}

/// Password line used when the account keeps the password submitted with
/// the registration request.
pub const SUBMITTED_PASSWORD_LINE: &str = "пароль, указанный при регистрации";

const EXCERPT_LIMIT: usize = 200;

fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_LIMIT {
        format!("{}...", truncate_chars(text, EXCERPT_LIMIT))
    } else {
        text.to_string()
    }
}

fn status_ru(value: &str) -> &str {
    RequestStatus::parse(value)
        .map(|s| s.display_ru())
        .unwrap_or(value)
}

fn category_ru(value: &str) -> &str {
    RequestCategory::parse(value)
        .map(|c| c.display_ru())
        .unwrap_or(value)
}

fn role_ru(value: &str) -> &str {
    Role::parse(value).map(|r| r.display_ru()).unwrap_or(value)
}

// ===== Request Mails =====

pub fn request_created(request: &SupportRequest, base_url: &str) -> MailText {
    let mut body = String::from("Создана новая заявка:\n\n");
    body.push_str(&format!("Название: {}\n", request.title));
    // The created mail always carries the trailing dots, even for short text.
    body.push_str(&format!(
        "Описание: {}...\n",
        truncate_chars(&request.description, EXCERPT_LIMIT)
    ));
    body.push_str(&format!("Категория: {}\n", category_ru(&request.category)));
    body.push_str(&format!("Статус: {}\n\n", status_ru(&request.status)));
    body.push_str(&format!(
        "Просмотреть заявку: {}/requests/{}/",
        base_url, request.id
    ));
    MailText {
        subject: format!("Новая заявка: {}", request.title),
        body,
    }
}

pub fn request_status_changed(
    request: &SupportRequest,
    old_status: &str,
    new_status: &str,
    base_url: &str,
) -> MailText {
    let mut body = String::from("Статус заявки изменен:\n\n");
    body.push_str(&format!("Заявка: {}\n", request.title));
    body.push_str(&format!("Описание: {}\n\n", excerpt(&request.description)));
    body.push_str(&format!("Старый статус: {}\n", status_ru(old_status)));
    body.push_str(&format!("Новый статус: {}\n\n", status_ru(new_status)));
    body.push_str(&format!(
        "Просмотреть заявку: {}/requests/{}/",
        base_url, request.id
    ));
    MailText {
        subject: format!("Изменен статус заявки: {}", request.title),
        body,
    }
}

// ===== Comment Mails =====

pub fn comment_on_request(
    author_name: &str,
    text: &str,
    request_title: &str,
    request_id: Uuid,
    base_url: &str,
) -> MailText {
    let mut body = format!("Пользователь {} добавил комментарий:\n\n", author_name);
    body.push_str(&format!("{}\n\n", excerpt(text)));
    body.push_str(&format!("К заявке: {}\n", request_title));
    body.push_str(&format!("Ссылка: {}/requests/{}/", base_url, request_id));
    MailText {
        subject: "Новый комментарий".to_string(),
        body,
    }
}

pub fn comment_on_article(
    author_name: &str,
    text: &str,
    article_title: &str,
    article_id: Uuid,
    base_url: &str,
) -> MailText {
    let mut body = format!("Пользователь {} добавил комментарий:\n\n", author_name);
    body.push_str(&format!("{}\n\n", excerpt(text)));
    body.push_str(&format!("К статье: {}\n", article_title));
    body.push_str(&format!("Ссылка: {}/article/{}/", base_url, article_id));
    MailText {
        subject: "Новый комментарий".to_string(),
        body,
    }
}

// ===== Registration Mails =====

pub fn registration_submitted(registration: &RegistrationRequest) -> MailText {
    MailText {
        subject: format!("Новый запрос на регистрацию: {}", registration.username),
        body: format!(
            "Пользователь {} ({}) подал запрос на регистрацию. Роль: {}. Проверьте в админ-панели.",
            registration.username,
            registration.email,
            role_ru(&registration.requested_role)
        ),
    }
}

pub fn registration_approved(username: &str, password_line: &str, base_url: &str) -> MailText {
    MailText {
        subject: "Ваш запрос на регистрацию одобрен".to_string(),
        body: format!(
            "Ваш запрос на регистрацию одобрен администратором.\n\n\
             Ваш логин: {}\n\
             Пароль: {}\n\n\
             Пожалуйста, войдите в систему по ссылке ниже.\n\n\
             Ссылка для входа: {}/accounts/login/\n\n\
             После входа вы сможете изменить пароль в личном кабинете.",
            username, password_line, base_url
        ),
    }
}

pub fn registration_rejected(reason: &str) -> MailText {
    let reason = if reason.is_empty() { "Не указана" } else { reason };
    MailText {
        subject: "Ваш запрос на регистрацию отклонен".to_string(),
        body: format!(
            "К сожалению, ваш запрос на регистрацию был отклонен администратором.\n\n\
             Причина: {}\n\n\
             Если у вас есть вопросы, свяжитесь с администратором.",
            reason
        ),
    }
}

// ===== Account Mails =====

pub fn password_changed(base_url: &str) -> MailText {
    MailText {
        subject: "Пароль изменен".to_string(),
        body: format!(
            "Ваш пароль был успешно изменен.\n\n\
             Если это были не вы, немедленно свяжитесь с администратором.\n\n\
             Ссылка для входа: {}/accounts/login/",
            base_url
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_request(description: &str) -> SupportRequest {
        SupportRequest {
            id: Uuid::new_v4(),
            title: "Не работает принтер".to_string(),
            description: description.to_string(),
            category: "Technical".to_string(),
            status: "New".to_string(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_created_mail_always_carries_trailing_dots() {
        let request = sample_request("короткое описание");
        let mail = request_created(&request, "http://portal.local");
        assert!(mail.body.contains("Описание: короткое описание...\n"));
        assert!(mail.subject.starts_with("Новая заявка:"));
        assert!(mail
            .body
            .ends_with(&format!("/requests/{}/", request.id)));
    }

    #[test]
    fn test_excerpt_adds_dots_only_past_two_hundred_chars() {
        let exactly = "ф".repeat(200);
        assert_eq!(excerpt(&exactly), exactly);
        let longer = "ф".repeat(201);
        let cut = excerpt(&longer);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_status_mail_uses_russian_labels_with_raw_fallback() {
        let request = sample_request("описание");
        let mail = request_status_changed(&request, "New", "In Progress", "http://portal.local");
        assert!(mail.body.contains("Старый статус: Новая\n"));
        assert!(mail.body.contains("Новый статус: В работе\n"));
        let odd = request_status_changed(&request, "Archived", "New", "http://portal.local");
        assert!(odd.body.contains("Старый статус: Archived\n"));
    }

    #[test]
    fn test_comment_mails_name_their_parent() {
        let id = Uuid::new_v4();
        let on_request =
            comment_on_request("Иван Иванов", "текст", "Сбой сети", id, "http://portal.local");
        assert_eq!(on_request.subject, "Новый комментарий");
        assert!(on_request.body.contains("К заявке: Сбой сети\n"));
        assert!(on_request
            .body
            .ends_with(&format!("http://portal.local/requests/{}/", id)));

        let on_article =
            comment_on_article("Иван Иванов", "текст", "Инструкция", id, "http://portal.local");
        assert!(on_article.body.contains("К статье: Инструкция\n"));
        assert!(on_article
            .body
            .ends_with(&format!("http://portal.local/article/{}/", id)));
    }

    #[test]
    fn test_rejection_reason_defaults_when_blank() {
        let mail = registration_rejected("");
        assert!(mail.body.contains("Причина: Не указана\n"));
        let given = registration_rejected("Недостаточно данных");
        assert!(given.body.contains("Причина: Недостаточно данных\n"));
    }

    #[test]
    fn test_approved_mail_links_through_base_url() {
        let mail = registration_approved("ivanov", SUBMITTED_PASSWORD_LINE, "https://portal.corp");
        assert!(mail.body.contains("Ваш логин: ivanov\n"));
        assert!(mail.body.contains("Пароль: пароль, указанный при регистрации\n"));
        assert!(mail
            .body
            .contains("Ссылка для входа: https://portal.corp/accounts/login/"));
    }
}

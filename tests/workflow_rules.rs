#[cfg(test)]
mod workflow_rules_tests {
    use chrono::Utc;
    use portalserver::auth::{permitted, Action};
    use portalserver::classify::{classify, resolve_group};
    use portalserver::comments::{validate_attachment, CommentError, CommentParent};
    use portalserver::notify::{best_effort, dedup_recipients, messages, MailError, Mailer};
    use portalserver::shared::models::{
        GroupLabel, RequestCategory, RequestStatus, Role, SupportRequest,
    };
    use std::sync::Mutex;
    use uuid::Uuid;

    const BASE_URL: &str = "http://portal.local";

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), MailError> {
            self.sent.lock().unwrap().push((
                subject.to_string(),
                body.to_string(),
                recipients.to_vec(),
            ));
            Ok(())
        }
    }

    fn ticket(title: &str, description: &str, category: RequestCategory) -> SupportRequest {
        SupportRequest {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.as_str().to_string(),
            status: RequestStatus::New.as_str().to_string(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_technical_ticket_intake_notifies_admin_inbox() {
        let title = "Не работает принтер";
        let description = "Принтер в кабинете 204 выдает ошибку при печати";

        let category = classify(title, description);
        assert_eq!(category, RequestCategory::Technical);
        assert_eq!(resolve_group(category), GroupLabel::Support);

        let request = ticket(title, description, category);
        let mail = messages::request_created(&request, BASE_URL);

        let mailer = RecordingMailer::default();
        let recipients = dedup_recipients(vec![Some("admin@example.com".to_string())]);
        best_effort(&mailer, &mail.subject, &mail.body, &recipients);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (subject, body, to) = &sent[0];
        assert_eq!(subject, "Новая заявка: Не работает принтер");
        assert!(body.contains("Категория: Техническая"));
        assert!(body.contains(&format!("{}/requests/{}/", BASE_URL, request.id)));
        assert_eq!(to, &vec!["admin@example.com".to_string()]);
    }

    #[test]
    fn test_intake_without_admin_inbox_sends_nothing() {
        let request = ticket("Вопрос по отпуску", "Как оформить отпуск", RequestCategory::Other);
        assert_eq!(resolve_group(RequestCategory::Other), GroupLabel::Admin);

        let mail = messages::request_created(&request, BASE_URL);
        let mailer = RecordingMailer::default();
        best_effort(&mailer, &mail.subject, &mail.body, &dedup_recipients(vec![None]));

        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_status_change_reaches_creator_and_admin_once_each() {
        let request = ticket(
            "Сбой сети",
            "Пропадает соединение на третьем этаже",
            RequestCategory::Technical,
        );
        let new_status = RequestStatus::parse("In Progress").unwrap();
        let mail = messages::request_status_changed(
            &request,
            &request.status,
            new_status.as_str(),
            BASE_URL,
        );

        // Creator appears twice in the candidate list; the mail must not.
        let recipients = dedup_recipients(vec![
            Some("creator@example.com".to_string()),
            Some("admin@example.com".to_string()),
            Some("creator@example.com".to_string()),
        ]);
        let mailer = RecordingMailer::default();
        best_effort(&mailer, &mail.subject, &mail.body, &recipients);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (_, body, to) = &sent[0];
        assert_eq!(
            to,
            &vec![
                "creator@example.com".to_string(),
                "admin@example.com".to_string()
            ]
        );
        assert!(body.contains("Старый статус: Новая"));
        assert!(body.contains("Новый статус: В работе"));
    }

    #[test]
    fn test_status_mail_downgrades_to_admin_when_creator_is_unresolvable() {
        let request = ticket(
            "Сбой сети",
            "Пропадает соединение на третьем этаже",
            RequestCategory::Technical,
        );
        let mail = messages::request_status_changed(
            &request,
            &request.status,
            RequestStatus::Completed.as_str(),
            BASE_URL,
        );

        // A creator without a resolvable address contributes no recipient;
        // the already-committed status change still goes out to the admin.
        let recipients = dedup_recipients(vec![None, Some("admin@example.com".to_string())]);
        let mailer = RecordingMailer::default();
        best_effort(&mailer, &mail.subject, &mail.body, &recipients);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, vec!["admin@example.com".to_string()]);
    }

    #[test]
    fn test_comment_hangs_off_exactly_one_parent() {
        let article = Uuid::new_v4();
        let request = Uuid::new_v4();

        assert!(matches!(
            validate_attachment(None, None),
            Err(CommentError::MissingParent)
        ));
        assert!(matches!(
            validate_attachment(Some(article), Some(request)),
            Err(CommentError::AmbiguousParent)
        ));

        let parent = validate_attachment(None, Some(request)).unwrap();
        assert_eq!(parent, CommentParent::Request(request));

        let mail = messages::comment_on_request(
            "Анна Иванова",
            "Проверила, дело в драйвере",
            "Не работает принтер",
            request,
            BASE_URL,
        );
        assert!(mail.body.contains("Пользователь Анна Иванова добавил комментарий"));
        assert!(mail.body.contains("К заявке: Не работает принтер"));
    }

    #[test]
    fn test_permission_ladder_over_ticket_lifecycle() {
        // Any support-tier role moves tickets along.
        assert!(permitted(Role::Support, false, false, Action::ChangeRequestStatus));
        assert!(permitted(Role::Moderator, false, false, Action::ChangeRequestStatus));
        assert!(!permitted(Role::User, false, false, Action::ChangeRequestStatus));

        // Editorial work stays with moderators.
        assert!(!permitted(Role::Support, false, false, Action::PublishArticle));
        assert!(permitted(Role::Moderator, false, false, Action::PublishArticle));

        // Destructive and account operations need the admin tier, which the
        // superuser flag grants regardless of role.
        for action in [
            Action::DeleteRequest,
            Action::ReviewRegistrations,
            Action::ManageDepartments,
            Action::ManageUsers,
        ] {
            assert!(!permitted(Role::Moderator, false, false, action));
            assert!(permitted(Role::Admin, false, false, action));
            assert!(permitted(Role::Support, false, true, action));
        }
    }

    #[test]
    fn test_approval_mail_carries_generated_or_submitted_password() {
        let generated = messages::registration_approved("petrov", "Xk3pQ9mWnZ7RtY2v", BASE_URL);
        assert!(generated.body.contains("Пароль: Xk3pQ9mWnZ7RtY2v\n"));

        let kept =
            messages::registration_approved("petrov", messages::SUBMITTED_PASSWORD_LINE, BASE_URL);
        assert!(kept
            .body
            .contains("Пароль: пароль, указанный при регистрации\n"));
    }

    #[test]
    fn test_status_vocabulary_is_closed_and_case_sensitive() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert!(RequestStatus::parse("Done").is_none());
        assert!(RequestStatus::parse("new").is_none());

        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert!(Role::parse("Admin").is_none());
    }
}

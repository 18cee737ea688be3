use crate::config::EmailConfig;
use crate::shared::state::AppState;
use lettre::{transport::smtp::authentication::Credentials, Message, SmtpTransport, Transport};
use log::warn;
use std::sync::Arc;
use thiserror::Error;

pub mod messages;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp transport failure: {0}")]
    Transport(String),
}

/// Outbound mail seam. Workflow code depends on this trait so delivery can
/// be swapped out without touching the call sites.
pub trait Mailer: Send + Sync {
    fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), MailError>;
}

// ===== SMTP Implementation =====

pub struct SmtpMailer {
    transport: SmtpTransport,
    from_address: String,
}

impl SmtpMailer {
    pub fn from_config(email: &EmailConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(email.username.clone(), email.password.clone());
        let transport = SmtpTransport::relay(&email.smtp_server)
            .map_err(|e| MailError::Transport(format!("{}: {}", email.smtp_server, e)))?
            .port(email.smtp_port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from_address: email.from_address.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), MailError> {
        if recipients.is_empty() {
            return Ok(());
        }
        let mut builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| MailError::Address(format!("{}: {}", self.from_address, e)))?,
            )
            .subject(subject);
        for recipient in recipients {
            builder = builder.to(recipient
                .parse()
                .map_err(|e| MailError::Address(format!("{}: {}", recipient, e)))?);
        }
        let message = builder
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(&message)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Bundle of everything a workflow step needs to dispatch mail.
pub struct NotifyContext {
    pub mailer: Arc<dyn Mailer>,
    pub admin_email: Option<String>,
    pub base_url: String,
}

impl NotifyContext {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            mailer: Arc::clone(&state.mailer),
            admin_email: state.config.email.admin_email.clone(),
            base_url: state.config.base_url.clone(),
        }
    }
}

// ===== Dispatch Helpers =====

/// Drops the candidate address when it belongs to the person who caused
/// the notification. Nobody gets mail about their own comment.
pub fn exclude_author(candidate: Option<String>, author_email: &str) -> Option<String> {
    candidate.filter(|email| email != author_email)
}

/// Flattens candidate addresses into a recipient list, dropping blanks and
/// duplicates while preserving first-seen order.
pub fn dedup_recipients(candidates: Vec<Option<String>>) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for address in candidates.into_iter().flatten() {
        if address.is_empty() {
            continue;
        }
        if !recipients.contains(&address) {
            recipients.push(address);
        }
    }
    recipients
}

/// Sends a notification whose failure must never fail the operation that
/// triggered it. Errors are logged and swallowed.
pub fn best_effort(mailer: &dyn Mailer, subject: &str, body: &str, recipients: &[String]) {
    if recipients.is_empty() {
        return;
    }
    if let Err(e) = mailer.send(subject, body, recipients) {
        warn!(
            "notification '{}' to {} recipient(s) failed: {}",
            subject,
            recipients.len(),
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingMailer {
        sent: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl Mailer for RecordingMailer {
        fn send(
            &self,
            subject: &str,
            _body: &str,
            recipients: &[String],
        ) -> Result<(), MailError> {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), recipients.to_vec()));
            Ok(())
        }
    }

    struct FailingMailer;

    impl Mailer for FailingMailer {
        fn send(&self, _: &str, _: &str, _: &[String]) -> Result<(), MailError> {
            Err(MailError::Transport("connection refused".to_string()))
        }
    }

    #[test]
    fn test_exclude_author_drops_only_the_author_address() {
        assert_eq!(
            exclude_author(Some("creator@example.com".to_string()), "creator@example.com"),
            None
        );
        assert_eq!(
            exclude_author(Some("creator@example.com".to_string()), "other@example.com"),
            Some("creator@example.com".to_string())
        );
        assert_eq!(exclude_author(None, "creator@example.com"), None);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let recipients = dedup_recipients(vec![
            Some("creator@example.com".to_string()),
            Some("admin@example.com".to_string()),
            Some("creator@example.com".to_string()),
        ]);
        assert_eq!(
            recipients,
            vec!["creator@example.com".to_string(), "admin@example.com".to_string()]
        );
    }

    #[test]
    fn test_dedup_drops_missing_and_blank() {
        let recipients = dedup_recipients(vec![
            None,
            Some(String::new()),
            Some("admin@example.com".to_string()),
        ]);
        assert_eq!(recipients, vec!["admin@example.com".to_string()]);
    }

    #[test]
    fn test_best_effort_skips_empty_recipient_list() {
        let mailer = RecordingMailer {
            sent: Mutex::new(Vec::new()),
        };
        best_effort(&mailer, "subject", "body", &[]);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_best_effort_swallows_transport_failure() {
        best_effort(
            &FailingMailer,
            "subject",
            "body",
            &["someone@example.com".to_string()],
        );
    }
}

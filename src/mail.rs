use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::planner::PlannerTask;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address {0}")]
    Address(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("smtp: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport })
    }
}

fn mailbox(raw: &str) -> Result<Mailbox, MailError> {
    raw.parse().map_err(|_| MailError::Address(raw.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(mailbox(&message.from)?)
            .to(mailbox(&message.to)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn task_reminder(from: &str, to: &str, date: &str, task: &PlannerTask) -> MailMessage {
    let subject = escape_html(&task.subject);
    let notes = task
        .notes
        .as_deref()
        .map(|n| format!("<p><strong>Notes:</strong> {}</p>", escape_html(n)))
        .unwrap_or_default();
    let html = format!(
        "<h2>Study reminder</h2>\
         <p>You have a task scheduled for <strong>{date}</strong>.</p>\
         <p><strong>Subject:</strong> {subject}</p>\
         <p><strong>Priority:</strong> {priority}</p>\
         {notes}",
        date = escape_html(date),
        priority = task.priority.as_str(),
    );
    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Reminder: {} on {}", task.subject, date),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Priority;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>\"A&B\"</b>"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn reminder_includes_task_fields() {
        let task = PlannerTask {
            id: 7,
            subject: "Physics <lab>".to_string(),
            priority: Priority::High,
            notes: Some("bring goggles".to_string()),
            completed: false,
            notified: false,
        };
        let msg = task_reminder("bot@x.io", "me@x.io", "2025-09-01", &task);
        assert_eq!(msg.subject, "Reminder: Physics <lab> on 2025-09-01");
        assert!(msg.html.contains("Physics &lt;lab&gt;"));
        assert!(msg.html.contains("High"));
        assert!(msg.html.contains("bring goggles"));
    }

    #[test]
    fn reminder_without_notes_has_no_notes_line() {
        let task = PlannerTask {
            id: 1,
            subject: "Read".to_string(),
            priority: Priority::Medium,
            notes: None,
            completed: false,
            notified: false,
        };
        let msg = task_reminder("a@x.io", "b@x.io", "2025-09-02", &task);
        assert!(!msg.html.contains("Notes:"));
    }
}

use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub smtp_host: String,
    pub email_user: String,
    pub email_pass: String,
    pub notify_email: Option<String>,
    pub ai_api_key: String,
    pub ai_base_url: String,
    pub ai_model: String,
    pub client_origin: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            port: try_load("PORT", "5000")?,
            database_url: try_load("DATABASE_URL", "data/studysync.sqlite3")?,
            smtp_host: try_load("SMTP_HOST", "smtp.gmail.com")?,
            email_user: optional("EMAIL_USER").unwrap_or_default(),
            email_pass: optional("EMAIL_PASS").unwrap_or_default(),
            notify_email: optional("NOTIFY_EMAIL"),
            ai_api_key: optional("AI_API_KEY").unwrap_or_default(),
            ai_base_url: try_load("AI_BASE_URL", "https://api.openai.com/v1")?,
            ai_model: try_load("AI_MODEL", "gpt-4o-mini")?,
            client_origin: try_load("CLIENT_ORIGIN", "http://localhost:5173")?,
        })
    }

    /// Recipient used when a notify request names none.
    pub fn default_recipient(&self) -> Option<String> {
        self.notify_email
            .clone()
            .or_else(|| Some(self.email_user.clone()).filter(|u| !u.is_empty()))
    }
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            warn!("{key} not set");
            None
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e: T::Err| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            port: 5000,
            database_url: ":memory:".to_string(),
            smtp_host: "smtp.example.com".to_string(),
            email_user: String::new(),
            email_pass: String::new(),
            notify_email: None,
            ai_api_key: String::new(),
            ai_base_url: "http://localhost".to_string(),
            ai_model: "m".to_string(),
            client_origin: "http://localhost:5173".to_string(),
        }
    }

    #[test]
    fn default_recipient_prefers_notify_email() {
        let mut cfg = base();
        assert_eq!(cfg.default_recipient(), None);
        cfg.email_user = "bot@x.io".to_string();
        assert_eq!(cfg.default_recipient().as_deref(), Some("bot@x.io"));
        cfg.notify_email = Some("me@x.io".to_string());
        assert_eq!(cfg.default_recipient().as_deref(), Some("me@x.io"));
    }
}

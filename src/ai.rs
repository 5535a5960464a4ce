use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{0}")]
    Quota(String),

    #[error("{0}")]
    Failed(String),
}

/// Student context sent to the tip generator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    #[serde(default)]
    pub completed_tasks: u64,
    #[serde(default)]
    pub pending_tasks: u64,
    #[serde(default)]
    pub upcoming_exams: Vec<Value>,
    #[serde(default)]
    pub weekly_performance: Vec<Value>,
    #[serde(default)]
    pub weak_topics: Vec<Value>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": "You are a concise, encouraging study coach." },
                { "role": "user", "content": prompt },
            ],
        });
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Failed(e.to_string()))?;

        match resp.status().as_u16() {
            200..=299 => {}
            429 => {
                let text = resp.text().await.unwrap_or_default();
                return Err(GenerationError::Quota(text));
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                if text.contains("insufficient_quota") || text.contains("RESOURCE_EXHAUSTED") {
                    return Err(GenerationError::Quota(text));
                }
                return Err(GenerationError::Failed(format!(
                    "upstream returned {status}: {text}"
                )));
            }
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Failed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Failed("empty completion".to_string()))
    }
}

fn list_or_none(items: &[Value]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn build_prompt(req: &SuggestRequest) -> String {
    format!(
        "Give a student 5 short, practical study tips, one per line, numbered.\n\
         Completed tasks: {}\n\
         Pending tasks: {}\n\
         Upcoming exams: {}\n\
         Weekly performance: {}\n\
         Weak topics: {}",
        req.completed_tasks,
        req.pending_tasks,
        list_or_none(&req.upcoming_exams),
        list_or_none(&req.weekly_performance),
        list_or_none(&req.weak_topics),
    )
}

fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
        return line;
    }
    for marker in ['-', '*', '•'] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    line
}

/// Splits generated text into tips, dropping blank lines and list markers.
pub fn parse_tips(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_marker)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tips_strips_markers() {
        let text = "1. Review notes daily\n\n2) Sleep well\n- Use flashcards\n* Take breaks\n• Ask questions\n";
        assert_eq!(
            parse_tips(text),
            vec![
                "Review notes daily",
                "Sleep well",
                "Use flashcards",
                "Take breaks",
                "Ask questions"
            ]
        );
    }

    #[test]
    fn parse_tips_keeps_leading_numbers_that_are_not_markers() {
        assert_eq!(parse_tips("25 minutes of focus works"), vec!["25 minutes of focus works"]);
    }

    #[test]
    fn prompt_lists_context() {
        let req: SuggestRequest = serde_json::from_value(json!({
            "completedTasks": 3,
            "pendingTasks": 2,
            "upcomingExams": ["Calculus on Friday"],
            "weakTopics": ["integrals", "limits"]
        }))
        .unwrap();
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Completed tasks: 3"));
        assert!(prompt.contains("Pending tasks: 2"));
        assert!(prompt.contains("Calculus on Friday"));
        assert!(prompt.contains("integrals; limits"));
        assert!(prompt.contains("Weekly performance: none"));
    }
}

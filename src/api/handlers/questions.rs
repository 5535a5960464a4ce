use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::resource;
use crate::api::helpers::{body_object, opt_string, required_str};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};
use crate::store::Document;

const COLLECTION: &str = "questions";
const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route("/questions/{id}", delete(delete_question))
}

#[derive(Debug, Deserialize)]
struct QuestionFilter {
    topic: Option<String>,
}

fn question_input(body: &Bytes) -> AppResult<Document> {
    let raw = body_object(body)?;
    let question = required_str(&raw, "question")?;

    let Some(options) = raw.get("options").and_then(|v| v.as_array()) else {
        return Err(AppError::bad_params("missing options"));
    };
    let mut clean = Vec::with_capacity(options.len());
    for opt in options {
        let s = opt
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::bad_params("options must be non-empty strings"))?;
        clean.push(s.to_string());
    }
    if clean.len() < 2 {
        return Err(AppError::bad_params("options must contain at least two choices"));
    }

    let answer = required_str(&raw, "answer")?;
    if !clean.contains(&answer) {
        return Err(AppError::bad_params("answer must be one of the options"));
    }

    let mut doc = Document::new();
    doc.insert("question".to_string(), Value::String(question));
    doc.insert(
        "options".to_string(),
        Value::Array(clean.into_iter().map(Value::String).collect()),
    );
    doc.insert("answer".to_string(), Value::String(answer));
    if let Some(topic) = opt_string(&raw, "topic")? {
        doc.insert("topic".to_string(), Value::String(topic));
    }
    if let Some(difficulty) = opt_string(&raw, "difficulty")? {
        let difficulty = difficulty.to_ascii_lowercase();
        if !DIFFICULTIES.contains(&difficulty.as_str()) {
            return Err(AppError::bad_params("difficulty must be easy, medium or hard"));
        }
        doc.insert("difficulty".to_string(), Value::String(difficulty));
    }
    Ok(doc)
}

async fn list_questions(
    State(state): State<AppState>,
    Query(filter): Query<QuestionFilter>,
) -> AppResult<Json<Vec<Value>>> {
    let mut questions = resource::list(&state, COLLECTION)?;
    if let Some(topic) = filter.topic.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        questions.retain(|q| {
            q.get("topic")
                .and_then(|v| v.as_str())
                .map(|t| t.eq_ignore_ascii_case(topic))
                .unwrap_or(false)
        });
    }
    Ok(Json(questions))
}

async fn create_question(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    let doc = question_input(&body)?;
    resource::create(&state, COLLECTION, doc)
}

async fn delete_question(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    resource::delete(&state, COLLECTION, &id, "question")
}

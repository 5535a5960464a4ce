use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::resource;
use crate::api::helpers::{body_object, opt_string, parse_object_id, required_str};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};
use crate::planner::parse_date;
use crate::store::Document;

const COLLECTION: &str = "budget";
const KIND_INCOME: &str = "income";
const KIND_EXPENSE: &str = "expense";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/budget", get(list_entries).post(create_entry))
        .route("/budget/summary", get(summary))
        .route(
            "/budget/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}

fn entry_input(body: &Bytes) -> AppResult<Document> {
    let raw = body_object(body)?;

    let kind = required_str(&raw, "type")?.to_ascii_lowercase();
    if kind != KIND_INCOME && kind != KIND_EXPENSE {
        return Err(AppError::bad_params("type must be income or expense"));
    }
    let category = required_str(&raw, "category")?;
    let amount = match raw.get("amount") {
        None | Some(Value::Null) => return Err(AppError::bad_params("missing amount")),
        Some(v) => v
            .as_f64()
            .filter(|a| a.is_finite() && *a >= 0.0)
            .ok_or_else(|| AppError::bad_params("amount must be a non-negative number"))?,
    };

    let mut doc = Document::new();
    doc.insert("type".to_string(), Value::String(kind));
    doc.insert("category".to_string(), Value::String(category));
    doc.insert("amount".to_string(), json!(amount));
    if let Some(date) = opt_string(&raw, "date")? {
        doc.insert("date".to_string(), Value::String(parse_date(&date)?));
    }
    if let Some(note) = opt_string(&raw, "note")? {
        doc.insert("note".to_string(), Value::String(note));
    }
    Ok(doc)
}

async fn list_entries(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(resource::list(&state, COLLECTION)?))
}

async fn get_entry(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    Ok(Json(resource::get(&state, COLLECTION, &id, "budget entry")?))
}

async fn create_entry(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    let doc = entry_input(&body)?;
    resource::create(&state, COLLECTION, doc)
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let doc = entry_input(&body)?;
    resource::replace(&state, COLLECTION, &id, "budget entry", doc)
}

async fn delete_entry(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    resource::delete(&state, COLLECTION, &id, "budget entry")
}

async fn summary(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let entries = resource::list(&state, COLLECTION)?;
    let mut income = 0.0;
    let mut expense = 0.0;
    for entry in &entries {
        let amount = entry.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0);
        match entry.get("type").and_then(|v| v.as_str()) {
            Some(KIND_INCOME) => income += amount,
            Some(KIND_EXPENSE) => expense += amount,
            _ => {}
        }
    }
    Ok(Json(json!({
        "income": income,
        "expense": expense,
        "balance": income - expense,
        "count": entries.len(),
    })))
}

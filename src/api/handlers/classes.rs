use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use super::resource;
use crate::api::helpers::{body_object, opt_string, parse_object_id, required_str};
use crate::api::types::AppState;
use crate::error::AppResult;
use crate::store::Document;

const COLLECTION: &str = "classes";
const REQUIRED_FIELDS: [&str; 5] = ["subject", "instructor", "day", "startTime", "endTime"];
const OPTIONAL_FIELDS: [&str; 2] = ["room", "color"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/classes", get(list_classes).post(create_class))
        .route(
            "/api/classes/{id}",
            get(get_class).put(update_class).delete(delete_class),
        )
}

fn class_input(body: &Bytes) -> AppResult<Document> {
    let raw = body_object(body)?;
    let mut doc = Document::new();
    for key in REQUIRED_FIELDS {
        doc.insert(key.to_string(), Value::String(required_str(&raw, key)?));
    }
    for key in OPTIONAL_FIELDS {
        if let Some(v) = opt_string(&raw, key)? {
            doc.insert(key.to_string(), Value::String(v));
        }
    }
    Ok(doc)
}

async fn list_classes(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(resource::list(&state, COLLECTION)?))
}

async fn get_class(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    Ok(Json(resource::get(&state, COLLECTION, &id, "class")?))
}

async fn create_class(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    let doc = class_input(&body)?;
    resource::create(&state, COLLECTION, doc)
}

async fn update_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let doc = class_input(&body)?;
    resource::replace(&state, COLLECTION, &id, "class", doc)
}

async fn delete_class(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    resource::delete(&state, COLLECTION, &id, "class")
}

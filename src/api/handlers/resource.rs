//! Single-collection CRUD shared by the class, budget and question resources.

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::api::helpers::{now_ts, parse_object_id};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};
use crate::store::{self, Document};

pub fn list(state: &AppState, collection: &str) -> AppResult<Vec<Value>> {
    state
        .store
        .with_conn(|conn| Ok(store::find_all(conn, collection)?))
}

pub fn get(state: &AppState, collection: &str, raw_id: &str, label: &str) -> AppResult<Value> {
    let id = parse_object_id(raw_id)?;
    state
        .store
        .with_conn(|conn| Ok::<_, AppError>(store::find_by_id(conn, collection, &id)?))?
        .ok_or_else(|| AppError::not_found(format!("{label} not found")))
}

pub fn create(
    state: &AppState,
    collection: &str,
    mut doc: Document,
) -> AppResult<(StatusCode, Json<Value>)> {
    doc.insert("createdAt".to_string(), Value::String(now_ts()));
    let created = state
        .store
        .with_conn(|conn| Ok::<_, AppError>(store::insert_one(conn, collection, doc)?))?;
    let id = created.get(store::ID_FIELD).cloned().unwrap_or(Value::Null);
    info!(collection, id = %id, "document created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Find-and-replace returning the new document. `createdAt` survives the replace.
pub fn replace(
    state: &AppState,
    collection: &str,
    id: &str,
    label: &str,
    mut doc: Document,
) -> AppResult<Json<Value>> {
    doc.insert("updatedAt".to_string(), Value::String(now_ts()));
    let updated = state.store.transaction(|tx| -> AppResult<Option<Value>> {
        let Some(existing) = store::find_by_id(tx, collection, id)? else {
            return Ok(None);
        };
        if let Some(created_at) = existing.get("createdAt") {
            doc.insert("createdAt".to_string(), created_at.clone());
        }
        Ok(store::find_and_replace(tx, collection, id, doc)?)
    })?;
    let updated = updated.ok_or_else(|| AppError::not_found(format!("{label} not found")))?;
    info!(collection, id, "document replaced");
    Ok(Json(updated))
}

pub fn delete(state: &AppState, collection: &str, raw_id: &str, label: &str) -> AppResult<Json<Value>> {
    let id = parse_object_id(raw_id)?;
    let removed = state
        .store
        .with_conn(|conn| Ok::<_, AppError>(store::delete_one(conn, collection, &id)?))?;
    if !removed {
        return Err(AppError::not_found(format!("{label} not found")));
    }
    info!(collection, id = %id, "document deleted");
    Ok(Json(json!({ "ok": true, "deletedId": id })))
}

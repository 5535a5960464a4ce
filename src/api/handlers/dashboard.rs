use axum::{body::Bytes, extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::Value;

use super::resource;
use crate::api::helpers::{body_object, without_id};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};

const COLLECTION: &str = "dashboard";

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(list_items).post(create_item))
}

async fn create_item(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    let item = without_id(body_object(&body)?);
    if item.is_empty() {
        return Err(AppError::bad_params("dashboard item must not be empty"));
    }
    resource::create(&state, COLLECTION, item)
}

async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(resource::list(&state, COLLECTION)?))
}

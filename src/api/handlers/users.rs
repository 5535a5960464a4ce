use axum::{body::Bytes, extract::State, routing::get, Json, Router};
use serde_json::Value;
use tracing::info;

use crate::api::helpers::{body_object, now_ts, required_str, without_id};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};
use crate::store;

const COLLECTION: &str = "users";

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(list_users).post(upsert_user))
}

async fn upsert_user(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let mut fields = without_id(body_object(&body)?);
    let email = required_str(&fields, "email")?.to_ascii_lowercase();
    fields.remove("email");
    fields.insert("updatedAt".to_string(), Value::String(now_ts()));

    let user = state.store.with_conn(|conn| {
        Ok::<_, AppError>(store::upsert_by_field(conn, COLLECTION, "email", &email, fields)?)
    })?;
    info!(email = %email, "user upserted");
    Ok(Json(user))
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let users = state
        .store
        .with_conn(|conn| Ok::<_, AppError>(store::find_all(conn, COLLECTION)?))?;
    Ok(Json(users))
}

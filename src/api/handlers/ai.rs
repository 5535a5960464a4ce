use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::ai::{build_prompt, parse_tips, GenerationError, SuggestRequest};
use crate::api::types::AppState;
use crate::error::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/ai/suggest", post(suggest))
}

fn suggest_input(body: &Bytes) -> AppResult<SuggestRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SuggestRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::bad_params(format!("invalid suggest request: {e}")))
}

async fn suggest(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let req = suggest_input(&body)?;
    let prompt = build_prompt(&req);
    let text = state.tips.generate(&prompt).await.map_err(|e| match e {
        GenerationError::Quota(m) => {
            warn!("text generation throttled");
            AppError::UpstreamQuota(m)
        }
        GenerationError::Failed(m) => AppError::TextGeneration(m),
    })?;
    let tips = parse_tips(&text);
    info!(count = tips.len(), "study tips generated");
    Ok(Json(json!({ "tips": tips })))
}

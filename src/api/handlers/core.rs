use axum::{routing::get, Router};

use crate::api::types::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(liveness))
}

async fn liveness() -> &'static str {
    concat!("studysyncd ", env!("CARGO_PKG_VERSION"), " is running")
}

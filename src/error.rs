use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("task already notified")]
    AlreadyNotified,

    #[error("text generation quota exceeded: {0}")]
    UpstreamQuota(String),

    #[error("text generation failed: {0}")]
    TextGeneration(String),

    #[error("store error: {0}")]
    Persistence(#[from] StoreError),

    #[error("mail delivery failed: {0}")]
    MailDelivery(String),
}

impl AppError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_params",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyNotified => "already_notified",
            AppError::UpstreamQuota(_) => "quota_exceeded",
            AppError::TextGeneration(_) => "ai_failed",
            AppError::Persistence(_) => "db_failed",
            AppError::MailDelivery(_) => "mail_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::AlreadyNotified => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamQuota(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::TextGeneration(_) | AppError::Persistence(_) | AppError::MailDelivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "request failed");
        }
        let body = json!({
            "ok": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

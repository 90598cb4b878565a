use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sqlmap_core::error::CoreError;
use thiserror::Error;

pub const SCAN_NOT_FOUND: &str = "Scan ID not found";
pub const SCAN_NOT_CANCELLABLE: &str = "Scan ID not found or already finished";

/// API 错误，响应体统一为 `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => ApiError::BadRequest(msg),
            CoreError::JobNotFound(_) => ApiError::NotFound(SCAN_NOT_FOUND),
        }
    }
}

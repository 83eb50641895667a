use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::models::RateLimitedResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(&'static str),

    #[error("Rate limit exceeded. Try again later.")]
    RateLimited { retry_after: Duration, remaining: u32 },

    #[error("Not found")]
    NotFound,

    #[error("Error serving audio file")]
    Audio(#[source] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited {
                retry_after,
                remaining,
            } => {
                let body = RateLimitedResponse {
                    error: self.to_string(),
                    retry_after_ms: retry_after.as_millis() as u64,
                    remaining,
                };
                let mut res = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                // round up so clients never retry early
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
                res
            }
            AppError::MalformedPayload(_) | AppError::NotFound => {
                let status = match self {
                    AppError::NotFound => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                let body = serde_json::json!({ "error": self.to_string() });
                (status, Json(body)).into_response()
            }
            AppError::Audio(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response(),
        }
    }
}

use axum::{http::StatusCode, response::IntoResponse};
use tracing::error;

use crate::metrics;

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to render metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

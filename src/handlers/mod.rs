mod audio;
mod contact;
mod health;
mod metrics;

pub use audio::audio_handler;
pub use contact::{client_identifier, contact_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;

use crate::error::AppError;

// unknown /api/* routes must not fall through to the SPA document
pub async fn api_not_found() -> AppError {
    AppError::NotFound
}

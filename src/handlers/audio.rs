use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use crate::error::AppError;
use crate::state::AppState;

// Serves the background track; cache headers come from the /api/ policy
pub async fn audio_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let bytes = tokio::fs::read(&state.audio_file).await.map_err(|e| {
        error!("Error serving audio file {}: {e}", state.audio_file.display());
        AppError::Audio(e)
    })?;

    Ok((
        [(CONTENT_TYPE, "audio/mpeg"), (CONTENT_DISPOSITION, "inline")],
        bytes,
    ))
}

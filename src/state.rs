use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Args;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub rate_limiter: RateLimiter,
    pub dist_dir: PathBuf,  // built site root
    pub audio_file: PathBuf, // track behind /api/audio
}

impl AppState {
    pub fn from_args(args: &Args) -> Arc<Self> {
        Arc::new(Self {
            rate_limiter: RateLimiter::new(args.rate_limit, args.rate_window()),
            dist_dir: args.dist_dir.clone(),
            audio_file: args.audio_file.clone(),
        })
    }
}

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "portfolio-server")]
#[command(about = "Static file server for the portfolio single-page app")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // Directory holding the built site (index.html + assets)
    #[arg(short, long, env = "DIST_DIR", default_value = "dist")]
    pub dist_dir: PathBuf,

    // Track served by /api/audio
    #[arg(short, long, env = "AUDIO_FILE", default_value = "public/weightless.mp3")]
    pub audio_file: PathBuf,

    // Rate limit max contact submissions per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 5)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 15 * 60)]
    pub rate_window: u64,
}

impl Args {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn index_file(&self) -> PathBuf {
        self.dist_dir.join("index.html")
    }
}

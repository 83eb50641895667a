//! HTTP server for the portfolio single-page app.
//!
//! Serves the built site out of `dist/` with cache headers by content class,
//! answers every unknown non-API path with `index.html` so client-side
//! routing can take over, and hosts two small API routes: the rate limited
//! contact form and the background audio track. The [`player`] module holds
//! the playback controller that consumes that track.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod player;
pub mod rate_limit;
pub mod state;
pub mod static_files;

use config::Args;
use handlers::{api_not_found, audio_handler, contact_handler, health_handler, metrics_handler};
use state::AppState;

const CRASH_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Something went wrong</title></head>
<body>
  <h1>Something went wrong</h1>
  <p>We apologize for the inconvenience. Please try refreshing the page or contact support if the problem persists.</p>
  <button onclick="window.location.reload()">Refresh Page</button>
</body>
</html>
"#;

// Crash guard: log the panic and hand back a recovery page instead of a dropped connection.
// The panic detail only goes to the log; the page stays generic.
fn crash_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    error!("Uncaught error while handling request: {detail}");

    let mut res = (StatusCode::INTERNAL_SERVER_ERROR, CRASH_PAGE).into_response();
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    res
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let site = static_files::site_service(&state.dist_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/contact", post(contact_handler))
        .route("/api/audio", get(audio_handler))
        // the catch-all needs a non-empty remainder, so the bare prefix is its own route
        .route("/api/", any(api_not_found))
        .route("/api/{*rest}", any(api_not_found))
        .fallback_service(site)
        .layer(middleware::from_fn(static_files::cache_headers))
        .layer(CatchPanicLayer::custom(crash_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(args: Args) -> std::io::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = AppState::from_args(&args);
    if !args.index_file().is_file() {
        warn!("Entry document {} not found", args.index_file().display());
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Server is running on http://localhost:{}", args.port);
    info!("Serving {} (audio: {})", args.dist_dir.display(), args.audio_file.display());
    info!(
        "Contact rate limit: {} requests per {} seconds",
        args.rate_limit, args.rate_window
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

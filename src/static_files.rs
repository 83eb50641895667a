use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue,
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
    },
    middleware::Next,
    response::Response,
};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

use crate::metrics::REQUEST_TOTAL;

// fingerprinted by the bundler, safe to cache for a year
const IMMUTABLE_EXTENSIONS: &[&str] = &[
    "css", "js", "jpg", "jpeg", "png", "gif", "ico", "svg", "woff", "woff2", "ttf", "eot",
];

/// Caching class of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Immutable,
    Html,
    NoStore,
    Default,
}

impl CachePolicy {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/api/") {
            return CachePolicy::NoStore;
        }

        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some(e) if IMMUTABLE_EXTENSIONS.contains(&e) => CachePolicy::Immutable,
            Some("html") => CachePolicy::Html,
            _ => CachePolicy::Default,
        }
    }

    pub fn cache_control(self) -> &'static str {
        match self {
            CachePolicy::Immutable => "public, max-age=31536000",
            CachePolicy::Html | CachePolicy::Default => "public, max-age=3600",
            CachePolicy::NoStore => "no-store, no-cache, must-revalidate, proxy-revalidate",
        }
    }

    // An asset URL answered with the entry document is the SPA fallback, cache it as HTML
    pub fn settle(self, headers: &HeaderMap) -> Self {
        let is_html = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        match self {
            CachePolicy::Immutable if is_html => CachePolicy::Html,
            policy => policy,
        }
    }

    pub fn apply(self, headers: &mut HeaderMap) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(self.cache_control()));
        if self == CachePolicy::NoStore {
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
    }
}

// Middleware: stamp cache headers on every response based on the request path
pub async fn cache_headers(req: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();
    let policy = CachePolicy::for_path(req.uri().path());
    let mut res = next.run(req).await;
    let policy = policy.settle(res.headers());
    policy.apply(res.headers_mut());
    res
}

// Files from the dist dir, anything missing falls back to the SPA entry document
pub fn site_service(dist_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dist_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(dist_dir.join("index.html")))
}

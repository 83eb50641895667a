use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::metrics::{CONTACT_MESSAGES, RATE_LIMITED, RATE_LIMIT_KEYS};
use crate::models::{ContactRequest, ContactResponse};
use crate::state::AppState;

// Key for the rate limiter: first X-Forwarded-For hop, else the peer address
pub fn client_identifier(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn contact_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(payload): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    let client = client_identifier(&headers, &extensions);
    let limiter = &state.rate_limiter;

    let allowed = limiter.check_limit(&client);
    RATE_LIMIT_KEYS.set(limiter.tracked_keys() as f64);
    if !allowed {
        RATE_LIMITED.inc();
        let retry_after = limiter.remaining_window(&client);
        warn!(%client, ?retry_after, "Contact form rate limited");
        return Err(AppError::RateLimited {
            retry_after,
            remaining: limiter.remaining_requests(&client),
        });
    }

    payload.validate().map_err(AppError::MalformedPayload)?;

    CONTACT_MESSAGES.inc();
    info!(
        %client,
        name = %payload.name,
        email = %payload.email,
        subject = %payload.subject,
        "Contact message received: {}",
        payload.message
    );

    Ok(Json(ContactResponse {
        message: "Message Sent Successfully".to_string(),
        remaining: limiter.remaining_requests(&client),
    }))
}

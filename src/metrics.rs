use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("portfolio_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMITED: Counter = register_counter!(
        "portfolio_rate_limited_total",
        "Requests rejected by the rate limiter"
    )
    .unwrap();
    pub static ref CONTACT_MESSAGES: Counter = register_counter!(
        "portfolio_contact_messages_total",
        "Accepted contact form submissions"
    )
    .unwrap();
    pub static ref RATE_LIMIT_KEYS: Gauge = register_gauge!(
        "portfolio_rate_limit_keys",
        "Identifiers currently tracked by the rate limiter"
    )
    .unwrap();
}

// Render every registered metric in the prometheus text format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| format!("Encode error: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Encode error: {}", e))
}

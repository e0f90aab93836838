//! Bot API response classification.
//!
//! The provider answers every request with a JSON envelope:
//!
//! ```text
//! {"ok":true,"result":{"message_id":42,...}}
//! {"ok":false,"error_code":429,"description":"Too Many Requests: retry after 17","parameters":{"retry_after":17}}
//! ```
//!
//! Transports hand failures over as the raw body.  Bodies that are not
//! valid JSON (proxies, truncated reads) fall back to substring matching.
//! Nothing here panics on arbitrary input.

use serde::Deserialize;

use crate::error::SendFailure;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: bool,
    error_code: Option<u16>,
    #[serde(default)]
    description: String,
    parameters: Option<Parameters>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct Parameters {
    retry_after: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Message identifier from a successful response, if it is one.
pub fn message_id(raw: &str) -> Option<i64> {
    let env: Envelope = serde_json::from_str(raw).ok()?;
    if !env.ok {
        return None;
    }
    env.result.map(|m| m.message_id)
}

/// Classify a failed send.  `default_retry_after_secs` applies when a
/// rate-limit answer carries no usable delay.
pub fn classify(raw: &str, default_retry_after_secs: u32) -> SendFailure {
    match serde_json::from_str::<Envelope>(raw) {
        Ok(env) => classify_envelope(&env, raw, default_retry_after_secs),
        Err(_) => classify_text(raw, default_retry_after_secs),
    }
}

fn classify_envelope(env: &Envelope, raw: &str, default_retry_after_secs: u32) -> SendFailure {
    match env.error_code {
        Some(429) => SendFailure::RateLimited {
            retry_after_secs: env
                .parameters
                .as_ref()
                .and_then(|p| p.retry_after)
                .unwrap_or(default_retry_after_secs),
        },
        Some(400) if env.description.contains("chat not found") => SendFailure::ChatNotFound,
        Some(401) => SendFailure::Unauthorized,
        _ => SendFailure::Other(raw.to_owned()),
    }
}

fn classify_text(raw: &str, default_retry_after_secs: u32) -> SendFailure {
    if raw.contains("\"error_code\":429") {
        let retry_after_secs = number_after(raw, "\"retry_after\":").unwrap_or(default_retry_after_secs);
        SendFailure::RateLimited { retry_after_secs }
    } else if raw.contains("\"error_code\":400") && raw.contains("chat not found") {
        SendFailure::ChatNotFound
    } else if raw.contains("\"error_code\":401") {
        SendFailure::Unauthorized
    } else {
        SendFailure::Other(raw.to_owned())
    }
}

/// Leading decimal digits after `key`, if any.
fn number_after(raw: &str, key: &str) -> Option<u32> {
    let start = raw.find(key)? + key.len();
    let rest = raw[start..].trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

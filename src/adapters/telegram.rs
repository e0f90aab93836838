//! Bot API transport adapter.
//!
//! Implements [`MessageTransport`] with one HTTPS `sendMessage` call per
//! attempt:
//!
//! ```text
//! POST https://api.telegram.org/bot<token>/sendMessage
//! {"chat_id":<id>,"text":"..."}
//! ```
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` with the built-in
//!   certificate bundle and a bounded timeout, driven through the
//!   `embedded_svc` client traits.
//! - **`not(target_os = "espidf")`**: simulation transport that logs and
//!   hands out sequential message ids.

use serde::Serialize;

use crate::app::ports::MessageTransport;
use crate::notify::response;

pub const API_BASE: &str = "https://api.telegram.org";
/// Upper bound on one attempt; the main loop waits on it.
pub const SEND_TIMEOUT_MS: u64 = 5_000;
/// Provider responses are small; anything longer is truncated.
const MAX_RESPONSE_BYTES: usize = 1024;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

pub fn endpoint(token: &str) -> String {
    format!("{API_BASE}/bot{token}/sendMessage")
}

pub fn request_body(chat_id: i64, text: &str) -> Result<String, String> {
    serde_json::to_string(&SendMessage { chat_id, text }).map_err(|e| e.to_string())
}

/// Map a raw provider answer to the port's result.
fn interpret(raw: String) -> Result<i64, String> {
    response::message_id(&raw).ok_or(raw)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF transport
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct BotTransport;

#[cfg(target_os = "espidf")]
impl BotTransport {
    pub fn new() -> Self {
        Self
    }

    fn post(&self, url: &str, body: &str) -> Result<String, String> {
        use core::time::Duration;
        use embedded_svc::http::client::Client;
        use embedded_svc::io::{Read, Write};
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let conn = EspHttpConnection::new(&Configuration {
            timeout: Some(Duration::from_millis(SEND_TIMEOUT_MS)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|e| format!("connection setup failed: {e}"))?;
        let mut client = Client::wrap(conn);

        let len = body.len().to_string();
        let headers = [
            ("content-type", "application/json"),
            ("content-length", len.as_str()),
        ];
        let mut request = client
            .post(url, &headers)
            .map_err(|e| format!("request failed: {e}"))?;
        request
            .write_all(body.as_bytes())
            .map_err(|e| format!("write failed: {e:?}"))?;
        request.flush().map_err(|e| format!("flush failed: {e:?}"))?;
        let mut response = request
            .submit()
            .map_err(|e| format!("submit failed: {e}"))?;

        let mut buf = [0u8; MAX_RESPONSE_BYTES];
        let mut filled = 0;
        while filled < buf.len() {
            match response.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => return Err(format!("read failed: {e:?}")),
            }
        }
        Ok(String::from_utf8_lossy(&buf[..filled]).into_owned())
    }
}

#[cfg(target_os = "espidf")]
impl MessageTransport for BotTransport {
    fn send(&mut self, token: &str, chat_id: i64, text: &str) -> Result<i64, String> {
        let body = request_body(chat_id, text)?;
        interpret(self.post(&endpoint(token), &body)?)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation transport
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct BotTransport {
    next_id: i64,
}

#[cfg(not(target_os = "espidf"))]
impl BotTransport {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }
}

#[cfg(not(target_os = "espidf"))]
impl MessageTransport for BotTransport {
    fn send(&mut self, _token: &str, chat_id: i64, text: &str) -> Result<i64, String> {
        let body = request_body(chat_id, text)?;
        log::info!("telegram(sim): -> chat {} ({} bytes)", chat_id, body.len());
        let id = self.next_id;
        self.next_id += 1;
        interpret(format!(r#"{{"ok":true,"result":{{"message_id":{id}}}}}"#))
    }
}

impl Default for BotTransport {
    fn default() -> Self {
        Self::new()
    }
}

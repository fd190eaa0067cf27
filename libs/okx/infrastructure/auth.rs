//! HMAC-SHA256 request signing for REST calls and WebSocket login.
//!
//! REST prehash: `{iso_timestamp}{METHOD}{request_path}{body}`.
//! WS login prehash: `{unix_seconds}GET/users/self/verify`.
//! Both are Base64-encoded HMAC-SHA256 digests keyed on the secret.

use std::sync::atomic::{AtomicI64, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::config::OkxCredentials;

type HmacSha256 = Hmac<Sha256>;

/// Signed headers attached to every authenticated REST request.
pub struct SignedHeaders {
    pub api_key: String,
    pub signature: String,
    pub timestamp: String,
    pub passphrase: String,
}

/// Signs requests with venue credentials. Keeps a clock offset so signed
/// timestamps track server time even when the local clock drifts.
pub struct OkxSigner {
    credentials: OkxCredentials,
    time_offset_ms: AtomicI64,
}

impl OkxSigner {
    pub fn new(credentials: OkxCredentials) -> Self {
        Self {
            credentials,
            time_offset_ms: AtomicI64::new(0),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    /// Record the server clock so subsequent timestamps are adjusted.
    pub fn set_server_time(&self, server_ms: i64) {
        let local_ms = Utc::now().timestamp_millis();
        self.time_offset_ms
            .store(server_ms - local_ms, Ordering::Relaxed);
    }

    fn adjusted_now(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::milliseconds(self.time_offset_ms.load(Ordering::Relaxed))
    }

    /// ISO-8601 millisecond timestamp used in REST prehashes.
    pub fn iso_timestamp(&self) -> String {
        self.adjusted_now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string()
    }

    fn hmac_base64(&self, message: &str) -> anyhow::Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
        mac.update(message.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Headers for a signed REST request. `request_path` includes the query
    /// string; `body` is the serialized JSON body or empty for GET.
    pub fn rest_headers(
        &self,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> anyhow::Result<SignedHeaders> {
        let timestamp = self.iso_timestamp();
        let prehash = format!("{}{}{}{}", timestamp, method, request_path, body);
        let signature = self.hmac_base64(&prehash)?;
        Ok(SignedHeaders {
            api_key: self.credentials.api_key.clone(),
            signature,
            timestamp,
            passphrase: self.credentials.passphrase.clone(),
        })
    }

    /// Argument object for the WebSocket `login` operation.
    pub fn ws_login_args(&self) -> anyhow::Result<serde_json::Value> {
        let timestamp = self.adjusted_now().timestamp().to_string();
        let prehash = format!("{}GET/users/self/verify", timestamp);
        let sign = self.hmac_base64(&prehash)?;
        Ok(json!({
            "apiKey": self.credentials.api_key,
            "passphrase": self.credentials.passphrase,
            "timestamp": timestamp,
            "sign": sign,
        }))
    }
}

//! Signed REST client.
//!
//! Wraps reqwest with the venue's header signing, envelope unwrapping and a
//! bounded retry on rate-limit responses.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::auth::OkxSigner;
use types::{
    AmendRequest, ApiResponse, BooksData, CancelRequest, HistoryTrade, InstrumentData,
    OrderRequest, OrderResponseData, PriceLimitData, ServerTime,
};

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(200);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("Rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("Empty data array in response")]
    EmptyData,

    #[error("Signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, RestError>;

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    signer: Arc<OkxSigner>,
    simulated: bool,
}

impl RestClient {
    pub fn new(base_url: String, signer: Arc<OkxSigner>, simulated: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            signer,
            simulated,
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn get<T: DeserializeOwned>(&self, path: &str, signed: bool) -> Result<Vec<T>> {
        self.request::<(), T>(reqwest::Method::GET, path, None, signed)
            .await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<Vec<T>> {
        self.request(reqwest::Method::POST, path, Some(body), true)
            .await
    }

    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
        signed: bool,
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        let body_str = match body {
            Some(b) => serde_json::to_string(b)
                .map_err(|e| RestError::Signing(format!("body serialization: {}", e)))?,
            None => String::new(),
        };

        let mut attempt = 0;
        loop {
            let mut req = self.http.request(method.clone(), &url);
            if signed {
                let headers = self
                    .signer
                    .rest_headers(method.as_str(), path, &body_str)
                    .map_err(|e| RestError::Signing(e.to_string()))?;
                req = req
                    .header("OK-ACCESS-KEY", headers.api_key)
                    .header("OK-ACCESS-SIGN", headers.signature)
                    .header("OK-ACCESS-TIMESTAMP", headers.timestamp)
                    .header("OK-ACCESS-PASSPHRASE", headers.passphrase);
                if self.simulated {
                    req = req.header("x-simulated-trading", "1");
                }
            }
            if body.is_some() {
                req = req
                    .header("Content-Type", "application/json")
                    .body(body_str.clone());
            }

            let response = req.send().await?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                if attempt > MAX_RETRIES {
                    return Err(RestError::RateLimited(attempt));
                }
                let backoff = BACKOFF_CAP.min(BACKOFF_BASE * 2u32.pow(attempt - 1));
                warn!(
                    "[Rest] Rate limited on {}, retrying in {:?} (attempt {})",
                    path, backoff, attempt
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            let envelope: ApiResponse<T> = response.json().await?;
            // Failed order operations come back with a non-zero envelope code
            // but still carry per-item sCode detail; surface the items when
            // present and error only on an empty payload.
            if envelope.code != "0" && envelope.data.is_empty() {
                return Err(RestError::Api {
                    code: envelope.code,
                    msg: envelope.msg,
                });
            }
            debug!("[Rest] {} {} -> {} items", method, path, envelope.data.len());
            return Ok(envelope.data);
        }
    }

    fn first<T>(mut data: Vec<T>) -> Result<T> {
        if data.is_empty() {
            Err(RestError::EmptyData)
        } else {
            Ok(data.remove(0))
        }
    }

    // ========================================================================
    // Public endpoints
    // ========================================================================

    /// Server clock in milliseconds.
    pub async fn server_time(&self) -> Result<i64> {
        let data: Vec<ServerTime> = self.get("/api/v5/public/time", false).await?;
        let first = Self::first(data)?;
        first.ts.parse::<i64>().map_err(|_| RestError::Api {
            code: "parse".to_string(),
            msg: format!("bad server timestamp: {}", first.ts),
        })
    }

    /// Fetch server time and fold it into the signer's clock offset.
    pub async fn sync_time(&self) -> Result<()> {
        let server_ms = self.server_time().await?;
        self.signer.set_server_time(server_ms);
        Ok(())
    }

    /// Full-depth book snapshot. Carries no sequence number; sequencing is
    /// established by the first WebSocket delta after the snapshot.
    pub async fn books(&self, inst_id: &str, depth: usize) -> Result<BooksData> {
        let path = format!("/api/v5/market/books?instId={}&sz={}", inst_id, depth);
        let data: Vec<BooksData> = self.get(&path, false).await?;
        Self::first(data)
    }

    /// Current highest-buy / lowest-sell price bands.
    pub async fn price_limit(&self, inst_id: &str) -> Result<PriceLimitData> {
        let path = format!("/api/v5/public/price-limit?instId={}", inst_id);
        let data: Vec<PriceLimitData> = self.get(&path, false).await?;
        Self::first(data)
    }

    pub async fn instruments(&self, inst_type: &str) -> Result<Vec<InstrumentData>> {
        let path = format!("/api/v5/public/instruments?instType={}", inst_type);
        self.get(&path, false).await
    }

    pub async fn history_trades(&self, inst_id: &str, limit: usize) -> Result<Vec<HistoryTrade>> {
        let path = format!(
            "/api/v5/market/history-trades?instId={}&limit={}",
            inst_id, limit
        );
        self.get(&path, false).await
    }

    // ========================================================================
    // Trading endpoints. A "0" envelope does not mean the order succeeded;
    // callers must check the per-item sCode.
    // ========================================================================

    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponseData> {
        let data: Vec<OrderResponseData> = self.post("/api/v5/trade/order", order).await?;
        Self::first(data)
    }

    pub async fn amend_order(&self, amend: &AmendRequest) -> Result<OrderResponseData> {
        let data: Vec<OrderResponseData> = self.post("/api/v5/trade/amend-order", amend).await?;
        Self::first(data)
    }

    pub async fn cancel_order(&self, cancel: &CancelRequest) -> Result<OrderResponseData> {
        let data: Vec<OrderResponseData> = self.post("/api/v5/trade/cancel-order", cancel).await?;
        Self::first(data)
    }
}

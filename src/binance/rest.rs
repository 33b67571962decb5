//! REST API client for the Binance spot API

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::auth::{signed_query, API_KEY_HEADER};
use super::messages::*;
use crate::common::errors::{BotError, Result};
use crate::config::types::ApiCredentials;

/// Default validity window for signed requests
const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

/// REST API client for Binance spot
#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the REST API
    base_url: String,
    /// Optional API credentials for signed endpoints
    credentials: Option<ApiCredentials>,
    /// recvWindow sent with signed requests
    recv_window_ms: u64,
}

impl BinanceRestClient {
    /// Create a new REST client (unauthenticated)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
        })
    }

    /// Set API credentials for signed requests
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the recvWindow for signed requests
    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    // ========================================================================
    // Public Endpoints (No Authentication Required)
    // ========================================================================

    /// Check connectivity
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<bool> {
        let url = format!("{}/api/v3/ping", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    /// Latest price for a symbol
    #[instrument(skip(self))]
    pub async fn get_ticker_price(&self, symbol: &str) -> Result<TickerPriceResponse> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        debug!("Fetching ticker from: {}", url);

        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }

    /// Candles for a symbol, oldest first
    #[instrument(skip(self))]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<KlineRow>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );
        debug!("Fetching klines from: {}", url);

        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }

    /// Trading rules for a symbol
    #[instrument(skip(self))]
    pub async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let url = format!("{}/api/v3/exchangeInfo?symbol={}", self.base_url, symbol);
        debug!("Fetching exchange info from: {}", url);

        let response = self.client.get(&url).send().await?;
        let info: ExchangeInfoResponse = Self::parse_response(response).await?;
        info.symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| BotError::InvalidResponse(format!("Symbol {} not listed", symbol)))
    }

    // ========================================================================
    // Signed Endpoints
    // ========================================================================

    /// Submit an order
    ///
    /// `params` must carry `symbol`, `side`, `type` and the size fields the
    /// order type needs.
    #[instrument(skip(self))]
    pub async fn new_order(&self, params: &[(&str, String)]) -> Result<OrderResponse> {
        let mut params = params.to_vec();
        params.push(("newOrderRespType", "FULL".to_string()));
        self.signed(Method::POST, "/api/v3/order", &params).await
    }

    /// Cancel an order
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<CancelOrderResponse> {
        let params = [("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        self.signed(Method::DELETE, "/api/v3/order", &params).await
    }

    /// Look up an order
    #[instrument(skip(self))]
    pub async fn get_order(&self, symbol: &str, order_id: u64) -> Result<OrderResponse> {
        let params = [("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        self.signed(Method::GET, "/api/v3/order", &params).await
    }

    /// Live orders for a symbol
    #[instrument(skip(self))]
    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<OrderResponse>> {
        let params = [("symbol", symbol.to_string())];
        self.signed(Method::GET, "/api/v3/openOrders", &params).await
    }

    /// Account balances
    #[instrument(skip(self))]
    pub async fn get_account(&self) -> Result<AccountResponse> {
        self.signed(Method::GET, "/api/v3/account", &[]).await
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    async fn signed<T: DeserializeOwned>(&self, method: Method, path: &str, params: &[(&str, String)]) -> Result<T> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| BotError::Authentication(format!("{} requires API credentials", path)))?;

        let query = signed_query(
            &credentials.api_secret,
            params,
            self.recv_window_ms,
            chrono::Utc::now().timestamp_millis(),
        )?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(%method, path, "Signed request");

        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &credentials.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Map non-success statuses to errors, otherwise decode the body
    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::RateLimit {
                message: body,
                retry_after_seconds,
            });
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => Err(BotError::Exchange {
                code: api_error.code,
                message: api_error.msg,
            }),
            Err(_) => Err(BotError::InvalidResponse(format!(
                "Server returned status {}: {}",
                status, body
            ))),
        }
    }
}

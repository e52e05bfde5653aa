//! Binance REST API client: a thin, blocking wrapper around the
//! authenticated endpoints the engine needs. HMAC signing, timestamping,
//! and HTTP-status-to-taxonomy translation all live here so nothing
//! above this module ever sees a raw status code or Binance error JSON.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use zeroize::Zeroizing;

use super::auth;
use super::types::{
    AccountInfo, BookTicker, DepthResponse, ExchangeInfo, OrderResponse, PriceTicker,
};
use crate::error::AdapterError;

type Result<T> = std::result::Result<T, AdapterError>;

/// Binance error codes that mean "the order id you gave me doesn't
/// exist" — signal, not failure. See Binance's error-code reference.
const CODE_UNKNOWN_ORDER: i64 = -2011;
const CODE_ORDER_DOES_NOT_EXIST: i64 = -2013;

#[derive(Debug, serde::Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Blocking Binance REST client.
pub struct BinanceClient {
    client: Client,
    api_key: String,
    /// Wiped on drop so a crash dump or swapped page doesn't leave the
    /// signing secret sitting in memory longer than it has to.
    secret_key: Zeroizing<String>,
    base_url: String,
}

impl BinanceClient {
    pub fn new(api_key: &str, secret_key: &str, testnet: bool) -> Self {
        let base_url = if testnet {
            "https://testnet.binance.vision"
        } else {
            "https://api.binance.com"
        };

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: api_key.to_string(),
            secret_key: Zeroizing::new(secret_key.to_string()),
            base_url: base_url.to_string(),
        }
    }

    fn signed_get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let signature = auth::sign(query, &self.secret_key);
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()?;
        self.decode(resp)
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, resp: reqwest::blocking::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        if status.is_success() {
            return serde_json::from_str(&body).map_err(AdapterError::from);
        }
        Err(self.classify_error(status, &body))
    }

    fn classify_error(&self, status: StatusCode, body: &str) -> AdapterError {
        if let Ok(err) = serde_json::from_str::<BinanceErrorBody>(body) {
            if err.code == CODE_UNKNOWN_ORDER || err.code == CODE_ORDER_DOES_NOT_EXIST {
                return AdapterError::OrderNotFound(err.msg);
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return AdapterError::Auth(err.msg);
            }
            if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
                return AdapterError::RateLimited(err.msg);
            }
            if err.code == -1013 || err.code == -2010 {
                return AdapterError::InvalidOrder(err.msg);
            }
            return AdapterError::ExchangeUnavailable(err.msg);
        }
        if status.is_server_error() {
            AdapterError::Transient(format!("{status}: {body}"))
        } else {
            AdapterError::ExchangeUnavailable(format!("{status}: {body}"))
        }
    }

    pub fn ping(&self) -> Result<()> {
        let url = format!("{}/api/v3/ping", self.base_url);
        let resp = self.client.get(&url).send()?;
        if !resp.status().is_success() {
            return Err(self.classify_error(resp.status(), &resp.text().unwrap_or_default()));
        }
        Ok(())
    }

    pub fn exchange_info(&self) -> Result<ExchangeInfo> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let resp = self.client.get(&url).send()?;
        self.decode(resp)
    }

    pub fn account_info(&self) -> Result<AccountInfo> {
        let timestamp = current_timestamp_ms();
        let query = format!("timestamp={timestamp}");
        self.signed_get("/api/v3/account", &query)
    }

    pub fn depth(&self, symbol: &str, limit: u32) -> Result<DepthResponse> {
        let url = format!(
            "{}/api/v3/depth?symbol={symbol}&limit={limit}",
            self.base_url
        );
        let resp = self.client.get(&url).send()?;
        self.decode(resp)
    }

    pub fn price_ticker(&self, symbol: &str) -> Result<PriceTicker> {
        let url = format!("{}/api/v3/ticker/price?symbol={symbol}", self.base_url);
        let resp = self.client.get(&url).send()?;
        self.decode(resp)
    }

    pub fn price_tickers(&self, symbols: &[String]) -> Result<Vec<PriceTicker>> {
        let list = symbols
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/api/v3/ticker/price?symbols=[{list}]",
            self.base_url
        );
        let resp = self.client.get(&url).send()?;
        self.decode(resp)
    }

    pub fn book_ticker(&self, symbol: &str) -> Result<BookTicker> {
        let url = format!("{}/api/v3/ticker/bookTicker?symbol={symbol}", self.base_url);
        let resp = self.client.get(&url).send()?;
        self.decode(resp)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        quantity: &str,
        price: Option<&str>,
        time_in_force: Option<&str>,
    ) -> Result<OrderResponse> {
        let timestamp = current_timestamp_ms();
        let mut query = format!(
            "symbol={symbol}&side={side}&type={order_type}&quantity={quantity}&timestamp={timestamp}"
        );
        if let Some(p) = price {
            query.push_str(&format!("&price={p}"));
        }
        if let Some(tif) = time_in_force {
            query.push_str(&format!("&timeInForce={tif}"));
        }

        let signature = auth::sign(&query, &self.secret_key);
        let url = format!("{}/api/v3/order", self.base_url);

        debug!("submitting binance order: {query}");

        let resp = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("{query}&signature={signature}"))
            .send()?;

        self.decode(resp)
    }

    pub fn order_status(&self, symbol: &str, order_id: u64) -> Result<OrderResponse> {
        let timestamp = current_timestamp_ms();
        let query = format!("symbol={symbol}&orderId={order_id}&timestamp={timestamp}");
        self.signed_get("/api/v3/order", &query)
    }

    pub fn open_orders(&self, symbol: &str) -> Result<Vec<OrderResponse>> {
        let timestamp = current_timestamp_ms();
        let query = format!("symbol={symbol}&timestamp={timestamp}");
        self.signed_get("/api/v3/openOrders", &query)
    }

    pub fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<()> {
        let timestamp = current_timestamp_ms();
        let query = format!("symbol={symbol}&orderId={order_id}&timestamp={timestamp}");
        let signature = auth::sign(&query, &self.secret_key);
        let url = format!("{}/api/v3/order?{query}&signature={signature}", self.base_url);

        let resp = self
            .client
            .delete(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()?;

        if !resp.status().is_success() {
            return Err(self.classify_error(resp.status(), &resp.text().unwrap_or_default()));
        }
        Ok(())
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

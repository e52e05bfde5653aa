//! Binance-specific wire types. Nothing outside this module ever sees
//! these shapes — [`super::BinanceAdapter`] normalizes everything to
//! `rebalancer_core::types` before returning.

use serde::Deserialize;

/// Binance account balance entry.
#[derive(Debug, Deserialize)]
pub struct BalanceInfo {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

/// Binance account info response (`GET /api/v3/account`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub balances: Vec<BalanceInfo>,
    #[serde(default)]
    pub can_trade: bool,
}

/// Binance order response, shared by create/fetch/cancel/open-orders
/// (`POST /api/v3/order`, `GET /api/v3/order`, `DELETE /api/v3/order`,
/// `GET /api/v3/openOrders`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: u64,
    pub side: String,
    pub status: String,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    #[serde(default)]
    pub cummulative_quote_qty: String,
}

/// Binance top-of-book ticker (`GET /api/v3/ticker/bookTicker`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTicker {
    pub symbol: String,
    pub bid_price: String,
    pub bid_qty: String,
    pub ask_price: String,
    pub ask_qty: String,
}

/// Binance last-price ticker (`GET /api/v3/ticker/price`).
#[derive(Debug, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    pub price: String,
}

/// Binance order book depth (`GET /api/v3/depth`). Each level is a
/// `[price, quantity]` pair encoded as strings.
#[derive(Debug, Deserialize)]
pub struct DepthResponse {
    #[serde(default)]
    pub last_update_id: u64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

/// One symbol's entry in `GET /api/v3/exchangeInfo`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub filters: Vec<SymbolFilter>,
}

/// `GET /api/v3/exchangeInfo` top-level response.
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// A single precision/minimum filter entry. Binance expresses both
/// price and lot-size precision as a `tickSize`/`stepSize` string rather
/// than an integer decimal-places count; `filter_kind` identifies which
/// filter this is so the adapter can pick the ones it needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    #[serde(rename = "filterType")]
    pub filter_kind: String,
    #[serde(default)]
    pub tick_size: Option<String>,
    #[serde(default)]
    pub step_size: Option<String>,
    #[serde(default)]
    pub min_notional: Option<String>,
    #[serde(default)]
    pub min_qty: Option<String>,
}

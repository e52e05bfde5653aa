//! Tests for Binance API response parsing and auth — no live connection needed.

use rebalancer_exchange::binance::auth;
use rebalancer_exchange::binance::types::{AccountInfo, BookTicker, DepthResponse, ExchangeInfo, OrderResponse};

// ============================================================================
// HMAC-SHA256 signing
// ============================================================================

#[test]
fn sign_binance_docs_example() {
    let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC\
                 &quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
    let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
    let sig = auth::sign(query, secret);
    assert_eq!(
        sig,
        "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
    );
}

#[test]
fn sign_empty_query() {
    let sig = auth::sign("", "secret");
    assert_eq!(sig.len(), 64, "SHA256 hex is always 64 chars");
}

#[test]
fn sign_deterministic() {
    let a = auth::sign("foo=bar", "key");
    let b = auth::sign("foo=bar", "key");
    assert_eq!(a, b, "same input must produce same signature");
}

#[test]
fn sign_different_keys_differ() {
    let a = auth::sign("foo=bar", "key1");
    let b = auth::sign("foo=bar", "key2");
    assert_ne!(a, b, "different keys must produce different signatures");
}

// ============================================================================
// AccountInfo parsing
// ============================================================================

#[test]
fn parse_account_info_full() {
    let json = r#"{
        "balances": [
            { "asset": "BTC", "free": "1.00000000", "locked": "0.50000000" },
            { "asset": "USDT", "free": "10000.00", "locked": "0.00" }
        ],
        "canTrade": true
    }"#;

    let info: AccountInfo = serde_json::from_str(json).unwrap();
    assert_eq!(info.balances.len(), 2);
    assert!(info.can_trade);
    assert_eq!(info.balances[0].asset, "BTC");
    assert_eq!(info.balances[0].free, "1.00000000");
    assert_eq!(info.balances[1].asset, "USDT");
}

#[test]
fn parse_account_info_empty_balances() {
    let json = r#"{ "balances": [] }"#;
    let info: AccountInfo = serde_json::from_str(json).unwrap();
    assert!(info.balances.is_empty());
    assert!(!info.can_trade);
}

#[test]
fn parse_account_info_extra_fields_ignored() {
    let json = r#"{
        "makerCommission": 15,
        "takerCommission": 15,
        "balances": [],
        "canTrade": true,
        "permissions": ["SPOT"]
    }"#;

    let info: AccountInfo = serde_json::from_str(json).unwrap();
    assert!(info.can_trade);
}

// ============================================================================
// OrderResponse parsing
// ============================================================================

#[test]
fn parse_order_response_filled() {
    let json = r#"{
        "symbol": "BTCUSDT",
        "orderId": 28,
        "side": "BUY",
        "status": "FILLED",
        "price": "10000.00",
        "origQty": "10.00000000",
        "executedQty": "10.00000000",
        "cummulativeQuoteQty": "100000.00"
    }"#;

    let resp: OrderResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.symbol, "BTCUSDT");
    assert_eq!(resp.order_id, 28);
    assert_eq!(resp.side, "BUY");
    assert_eq!(resp.status, "FILLED");
    assert_eq!(resp.orig_qty, "10.00000000");
    assert_eq!(resp.executed_qty, "10.00000000");
    assert_eq!(resp.cummulative_quote_qty, "100000.00");
}

#[test]
fn parse_order_response_new_without_cumulative_quote_qty() {
    let json = r#"{
        "symbol": "ETHUSDT",
        "orderId": 123456,
        "side": "SELL",
        "status": "NEW",
        "price": "2000.00",
        "origQty": "5.00000000",
        "executedQty": "0.00000000"
    }"#;

    let resp: OrderResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.status, "NEW");
    assert_eq!(resp.executed_qty, "0.00000000");
    assert_eq!(resp.cummulative_quote_qty, "");
}

#[test]
fn parse_order_response_partial_fill() {
    let json = r#"{
        "symbol": "BTCUSDT",
        "orderId": 42,
        "side": "BUY",
        "status": "PARTIALLY_FILLED",
        "price": "10000.00",
        "origQty": "5.00000000",
        "executedQty": "3.50000000",
        "cummulativeQuoteQty": "35000.00"
    }"#;

    let resp: OrderResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.status, "PARTIALLY_FILLED");
}

// ============================================================================
// BookTicker / DepthResponse / ExchangeInfo parsing
// ============================================================================

#[test]
fn parse_book_ticker() {
    let json = r#"{
        "symbol": "BTCUSDT",
        "bidPrice": "43250.50",
        "bidQty": "1.234",
        "askPrice": "43251.00",
        "askQty": "0.567"
    }"#;

    let ticker: BookTicker = serde_json::from_str(json).unwrap();
    assert_eq!(ticker.symbol, "BTCUSDT");
    assert_eq!(ticker.bid_price, "43250.50");
    assert_eq!(ticker.ask_price, "43251.00");
}

#[test]
fn parse_depth_response() {
    let json = r#"{
        "lastUpdateId": 1027024,
        "bids": [["4.00000000", "431.00000000"]],
        "asks": [["4.00000200", "12.00000000"]]
    }"#;

    let depth: DepthResponse = serde_json::from_str(json).unwrap();
    assert_eq!(depth.bids[0][0], "4.00000000");
    assert_eq!(depth.asks[0][1], "12.00000000");
}

#[test]
fn parse_exchange_info_filters() {
    let json = r#"{
        "symbols": [
            {
                "symbol": "BTCUSDT",
                "baseAsset": "BTC",
                "quoteAsset": "USDT",
                "filters": [
                    { "filterType": "PRICE_FILTER", "tickSize": "0.01000000" },
                    { "filterType": "LOT_SIZE", "stepSize": "0.00001000", "minQty": "0.00001000" },
                    { "filterType": "MIN_NOTIONAL", "minNotional": "10.00000000" }
                ]
            }
        ]
    }"#;

    let info: ExchangeInfo = serde_json::from_str(json).unwrap();
    assert_eq!(info.symbols.len(), 1);
    let s = &info.symbols[0];
    assert_eq!(s.base_asset, "BTC");
    assert_eq!(s.filters[0].filter_kind, "PRICE_FILTER");
    assert_eq!(s.filters[0].tick_size.as_deref(), Some("0.01000000"));
}

// ============================================================================
// Error cases — malformed JSON
// ============================================================================

#[test]
fn reject_missing_required_fields() {
    let json = r#"{ "canTrade": true }"#;
    assert!(serde_json::from_str::<AccountInfo>(json).is_err());
}

#[test]
fn reject_wrong_type_order_id() {
    let json = r#"{
        "symbol": "BTCUSDT",
        "orderId": "not_a_number",
        "side": "BUY",
        "status": "NEW",
        "price": "0",
        "origQty": "0.0",
        "executedQty": "0.0"
    }"#;
    assert!(serde_json::from_str::<OrderResponse>(json).is_err());
}

#[test]
fn reject_empty_json() {
    assert!(serde_json::from_str::<AccountInfo>("{}").is_err());
    assert!(serde_json::from_str::<OrderResponse>("{}").is_err());
    assert!(serde_json::from_str::<BookTicker>("{}").is_err());
}

//! Binance spot adapter: implements [`ExchangeAdapter`] over the
//! authenticated REST API via [`client::BinanceClient`].

pub mod auth;
pub mod client;
pub mod types;

use std::collections::HashMap;
use std::str::FromStr;

use rebalancer_core::types::{Balance, Market, Order, OrderBookSnapshot, OrderStatus, Side};
use rust_decimal::Decimal;

use crate::adapter::{Capabilities, ExchangeAdapter};
use crate::error::{AdapterError, Result};
use client::BinanceClient;
use types::{OrderResponse, SymbolFilter};

pub struct BinanceAdapter {
    client: BinanceClient,
}

impl BinanceAdapter {
    pub fn new(api_key: &str, secret_key: &str, testnet: bool) -> Self {
        Self {
            client: BinanceClient::new(api_key, secret_key, testnet),
        }
    }

    fn to_decimal(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap_or(Decimal::ZERO)
    }

    fn filter_tick_size(filters: &[SymbolFilter]) -> Decimal {
        filters
            .iter()
            .find(|f| f.filter_kind == "PRICE_FILTER")
            .and_then(|f| f.tick_size.as_deref())
            .map(Self::to_decimal)
            .unwrap_or_else(|| Decimal::new(1, 2))
    }

    fn filter_min_qty(filters: &[SymbolFilter]) -> Decimal {
        filters
            .iter()
            .find(|f| f.filter_kind == "LOT_SIZE")
            .and_then(|f| f.min_qty.as_deref())
            .map(Self::to_decimal)
            .unwrap_or(Decimal::ZERO)
    }

    fn filter_min_notional(filters: &[SymbolFilter]) -> Decimal {
        filters
            .iter()
            .find(|f| f.filter_kind == "MIN_NOTIONAL" || f.filter_kind == "NOTIONAL")
            .and_then(|f| f.min_notional.as_deref())
            .map(Self::to_decimal)
            .unwrap_or(Decimal::ZERO)
    }

    fn to_order(resp: OrderResponse) -> Order {
        let amount = Self::to_decimal(&resp.orig_qty);
        let executed = Self::to_decimal(&resp.executed_qty);
        let status = match resp.status.as_str() {
            "FILLED" => OrderStatus::Closed,
            "CANCELED" | "EXPIRED" | "REJECTED" => OrderStatus::Cancelled,
            _ => OrderStatus::Open,
        };
        let side = if resp.side.eq_ignore_ascii_case("BUY") {
            Side::Buy
        } else {
            Side::Sell
        };
        Order {
            id: resp.order_id.to_string(),
            symbol: resp.symbol.clone(),
            side,
            price: Self::to_decimal(&resp.price),
            amount,
            remaining: (amount - executed).max(Decimal::ZERO),
            status,
            raw: serde_json::json!({
                "symbol": resp.symbol,
                "orderId": resp.order_id,
                "status": resp.status,
            }),
        }
    }

    fn wire_symbol(symbol: &str) -> String {
        symbol.replace('/', "")
    }
}

impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        "binance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_fetch_order: true,
            has_fetch_open_orders: true,
        }
    }

    fn load_markets(&self) -> Result<HashMap<String, Market>> {
        let info = self.client.exchange_info()?;
        let mut markets = HashMap::with_capacity(info.symbols.len());
        for s in info.symbols {
            let symbol = Market::canonical_symbol(&s.base_asset, &s.quote_asset);
            let tick = Self::filter_tick_size(&s.filters);
            let min_qty = Self::filter_min_qty(&s.filters);
            let min_notional = Self::filter_min_notional(&s.filters);
            markets.insert(
                symbol.clone(),
                Market {
                    symbol,
                    base: s.base_asset,
                    quote: s.quote_asset,
                    price_precision: tick,
                    amount_precision: 8,
                    min_amount: min_qty,
                    min_cost: min_notional,
                },
            );
        }
        Ok(markets)
    }

    fn fetch_balance(&self) -> Result<HashMap<String, Balance>> {
        let info = self.client.account_info()?;
        let mut out = HashMap::with_capacity(info.balances.len());
        for b in info.balances {
            let free = Self::to_decimal(&b.free);
            let used = Self::to_decimal(&b.locked);
            if free.is_zero() && used.is_zero() {
                continue;
            }
            out.insert(b.asset, Balance { free, used });
        }
        Ok(out)
    }

    fn fetch_ticker(&self, symbol: &str) -> Result<Decimal> {
        let ticker = self.client.price_ticker(&Self::wire_symbol(symbol))?;
        Ok(Self::to_decimal(&ticker.price))
    }

    fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let wire: Vec<String> = symbols.iter().map(|s| Self::wire_symbol(s)).collect();
        let tickers = self.client.price_tickers(&wire)?;
        let mut out = HashMap::with_capacity(tickers.len());
        for (original, t) in symbols.iter().zip(tickers.iter()) {
            out.insert(original.clone(), Self::to_decimal(&t.price));
        }
        Ok(out)
    }

    fn fetch_order_book(&self, symbol: &str, limit: u32) -> Result<OrderBookSnapshot> {
        let depth = self.client.depth(&Self::wire_symbol(symbol), limit)?;
        let to_level = |raw: &[String; 2]| (Self::to_decimal(&raw[0]), Self::to_decimal(&raw[1]));
        Ok(OrderBookSnapshot {
            bids: depth.bids.iter().map(to_level).collect(),
            asks: depth.asks.iter().map(to_level).collect(),
            timestamp: None,
        })
    }

    fn create_order(&self, symbol: &str, side: Side, amount: Decimal, price: Decimal) -> Result<Order> {
        let wire_side = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let resp = self.client.submit_order(
            &Self::wire_symbol(symbol),
            wire_side,
            "LIMIT",
            &amount.normalize().to_string(),
            Some(&price.normalize().to_string()),
            Some("GTC"),
        )?;
        Ok(Self::to_order(resp))
    }

    fn cancel_order(&self, id: &str, symbol: &str, _side: Side) -> Result<()> {
        let order_id: u64 = id
            .parse()
            .map_err(|_| AdapterError::InvalidOrder(format!("not a binance order id: {id}")))?;
        self.client.cancel_order(&Self::wire_symbol(symbol), order_id)
    }

    fn fetch_order(&self, id: &str, symbol: &str) -> Result<Order> {
        let order_id: u64 = id
            .parse()
            .map_err(|_| AdapterError::InvalidOrder(format!("not a binance order id: {id}")))?;
        let resp = self.client.order_status(&Self::wire_symbol(symbol), order_id)?;
        Ok(Self::to_order(resp))
    }

    fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        let resp = self.client.open_orders(&Self::wire_symbol(symbol))?;
        Ok(resp.into_iter().map(Self::to_order).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_symbol_strips_slash() {
        assert_eq!(BinanceAdapter::wire_symbol("BTC/USDT"), "BTCUSDT");
    }

    #[test]
    fn to_order_maps_filled_status() {
        let resp = OrderResponse {
            symbol: "BTCUSDT".into(),
            order_id: 42,
            side: "BUY".into(),
            status: "FILLED".into(),
            price: "100.50".into(),
            orig_qty: "2".into(),
            executed_qty: "2".into(),
            cummulative_quote_qty: "201.00".into(),
        };
        let order = BinanceAdapter::to_order(resp);
        assert!(order.is_fully_filled());
        assert_eq!(order.remaining, Decimal::ZERO);
    }

    #[test]
    fn to_order_maps_partial_fill_remaining() {
        let resp = OrderResponse {
            symbol: "BTCUSDT".into(),
            order_id: 42,
            side: "SELL".into(),
            status: "NEW".into(),
            price: "100.50".into(),
            orig_qty: "5".into(),
            executed_qty: "2".into(),
            cummulative_quote_qty: "0".into(),
        };
        let order = BinanceAdapter::to_order(resp);
        assert_eq!(order.remaining, Decimal::from(3));
        assert_eq!(order.side, Side::Sell);
    }
}

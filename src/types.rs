//! Shared value types: symbols, markets, balances, orders.
//!
//! Prices and quantities are [`Decimal`] throughout — never `f64` — so
//! tick-size quantization is exact even for the sub-cent ticks common on
//! crypto markets.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the book an order or signal is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Which pricing algorithm a worker uses to compute its target price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitOrderStrategy {
    BestBidOrAsk,
    BetterThanBestPrice,
    WeightedAverage,
}

/// Market metadata: precision and minimums, known before any order is
/// placed for the symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Market {
    /// Engine-canonical symbol, `BASE/QUOTE`.
    pub symbol: String,
    pub base: String,
    pub quote: String,
    /// Either an integer count of decimal places (>=1) or the tick size
    /// directly (<1), per the exchange's own convention.
    pub price_precision: Decimal,
    pub amount_precision: u32,
    pub min_amount: Decimal,
    pub min_cost: Decimal,
}

impl Market {
    /// Minimum price increment, derived from `price_precision`.
    pub fn tick_size(&self) -> Decimal {
        crate::pricing::precision_to_tick_size(self.price_precision)
    }

    pub fn canonical_symbol(base: &str, quote: &str) -> String {
        format!("{base}/{quote}")
    }
}

/// One level of an order book: price and quantity resting there.
pub type Level = (Decimal, Decimal);

/// A snapshot of an order book, bids descending, asks ascending.
#[derive(Clone, Debug, Default)]
pub struct OrderBookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    /// Exchange server timestamp (epoch millis), when available.
    pub timestamp: Option<i64>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }
}

/// Free/used/total balance of a single asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    pub free: Decimal,
    pub used: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.used
    }
}

/// Lifecycle status of an order as last observed from the exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Closed,
    Cancelled,
}

/// Engine's view of a live order. `raw` preserves the exchange-native
/// payload for debugging; nothing downstream should inspect it.
#[derive(Clone, Debug)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub remaining: Decimal,
    pub status: OrderStatus,
    pub raw: serde_json::Value,
}

impl Order {
    /// Invariant: `remaining <= amount`, and `status == Closed` only once
    /// `remaining == 0` or the exchange reports it closed out from under us.
    pub fn is_fully_filled(&self) -> bool {
        self.status == OrderStatus::Closed && self.remaining <= Decimal::ZERO
    }
}

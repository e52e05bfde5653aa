//! The `ExchangeAdapter` capability interface: one implementation per
//! exchange, all using the canonical `BASE/QUOTE` symbol and engine
//! types. Replaces runtime string-dispatch over exchange name with a
//! single trait object per configured exchange.

use rebalancer_core::types::{Balance, Market, Order, OrderBookSnapshot, Side};
use rust_decimal::Decimal;

use crate::error::Result;

/// Capability flags: some exchanges cannot track order lifecycle by id
/// (no `FetchOrder`) or enumerate open orders (no `FetchOpenOrders`).
/// The engine falls back to market orders when a capability is absent.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub has_fetch_order: bool,
    pub has_fetch_open_orders: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            has_fetch_order: true,
            has_fetch_open_orders: true,
        }
    }
}

/// A single exchange's trading surface, normalized to engine types.
/// Implementations own HMAC signing, timestamp-skew compensation, and
/// exchange-error-code translation; none of that detail crosses this
/// boundary.
pub trait ExchangeAdapter: Send + Sync {
    /// Human-readable exchange name, as it appears in config/webhook
    /// payloads (e.g. `"binance"`).
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Load market metadata (precision, minimums) for every symbol the
    /// exchange lists. Called once, at `Portfolio` construction.
    fn load_markets(&self) -> Result<std::collections::HashMap<String, Market>>;

    /// Current free/used/total balance for every asset held.
    fn fetch_balance(&self) -> Result<std::collections::HashMap<String, Balance>>;

    /// Last traded price for one symbol.
    fn fetch_ticker(&self, symbol: &str) -> Result<Decimal>;

    /// Last traded price for several symbols in one round trip, when the
    /// exchange supports batching; callers should not assume all symbols
    /// are present in the result (missing symbols are simply omitted).
    fn fetch_tickers(&self, symbols: &[String]) -> Result<std::collections::HashMap<String, Decimal>>;

    /// Order book depth for one symbol, with server timestamp when the
    /// exchange provides one.
    fn fetch_order_book(&self, symbol: &str, limit: u32) -> Result<OrderBookSnapshot>;

    /// Place a limit order. Amount/price must already be normalized to
    /// the market's precision by the caller (or the adapter normalizes
    /// internally before the wire call — either way the adapter is the
    /// last place precision can be adjusted).
    fn create_order(&self, symbol: &str, side: Side, amount: Decimal, price: Decimal) -> Result<Order>;

    /// Cancel a resting order. `OrderNotFound` here is not a failure —
    /// it means the order already filled or was cancelled externally.
    fn cancel_order(&self, id: &str, symbol: &str, side: Side) -> Result<()>;

    /// Fetch the current state of a previously created order.
    fn fetch_order(&self, id: &str, symbol: &str) -> Result<Order>;

    /// All open orders on a symbol, used as a best-effort cancellation
    /// sweep when a single `cancel_order` call cannot find the order.
    fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>>;
}

//! In-memory exchange for tests — implements [`ExchangeAdapter`] with a
//! programmable order book and a simple order ledger. Never makes a
//! network call, so engine and portfolio tests run deterministically and
//! without credentials.
//!
//! ```
//! use rebalancer_exchange::mock::MockExchange;
//! use rebalancer_exchange::adapter::ExchangeAdapter;
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//!
//! let mock = MockExchange::new("mock");
//! mock.set_order_book(
//!     "BTC/USDT",
//!     vec![(Decimal::from_str("100.00").unwrap(), Decimal::from_str("1").unwrap())],
//!     vec![(Decimal::from_str("101.00").unwrap(), Decimal::from_str("1").unwrap())],
//! );
//! let book = mock.fetch_order_book("BTC/USDT", 10).unwrap();
//! assert_eq!(book.bids[0].0, Decimal::from_str("100.00").unwrap());
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use rebalancer_core::types::{Balance, Level, Market, Order, OrderBookSnapshot, OrderStatus, Side};
use rust_decimal::Decimal;

use crate::adapter::{Capabilities, ExchangeAdapter};
use crate::error::{AdapterError, Result};

/// What happens when `MockExchange::create_order` is called.
#[derive(Clone, Copy, Debug)]
pub enum FillMode {
    /// The order rests open, as submitted (the default — lets tests
    /// drive the engine's replace/reconcile logic explicitly).
    Resting,
    /// The order is immediately reported filled.
    ImmediateFull,
    /// Every create call fails with `InvalidOrder`.
    Reject,
}

struct State {
    markets: HashMap<String, Market>,
    balances: HashMap<String, Balance>,
    books: HashMap<String, (Vec<Level>, Vec<Level>)>,
    orders: HashMap<String, Order>,
    next_id: u64,
}

pub struct MockExchange {
    name: String,
    fill_mode: FillMode,
    state: Mutex<State>,
}

impl MockExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fill_mode: FillMode::Resting,
            state: Mutex::new(State {
                markets: HashMap::new(),
                balances: HashMap::new(),
                books: HashMap::new(),
                orders: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn with_fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn set_market(&self, market: Market) {
        self.state.lock().unwrap().markets.insert(market.symbol.clone(), market);
    }

    pub fn set_balance(&self, asset: &str, balance: Balance) {
        self.state.lock().unwrap().balances.insert(asset.to_string(), balance);
    }

    pub fn set_order_book(&self, symbol: &str, bids: Vec<Level>, asks: Vec<Level>) {
        self.state.lock().unwrap().books.insert(symbol.to_string(), (bids, asks));
    }

    /// Removes a symbol's order book entirely, so subsequent
    /// `fetch_order_book` calls fail — lets a test drive the engine's
    /// transient-error / error-budget path deterministically.
    pub fn clear_order_book(&self, symbol: &str) {
        self.state.lock().unwrap().books.remove(symbol);
    }

    /// Mark a previously created order closed, as if filled or cancelled
    /// externally — lets a test drive the engine's reconcile path.
    pub fn force_order_status(&self, id: &str, status: OrderStatus, remaining: Decimal) {
        let mut state = self.state.lock().unwrap();
        if let Some(order) = state.orders.get_mut(id) {
            order.status = status;
            order.remaining = remaining;
        }
    }

    pub fn open_order_count(&self, symbol: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.symbol == symbol && o.status == OrderStatus::Open)
            .count()
    }
}

impl ExchangeAdapter for MockExchange {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_fetch_order: true,
            has_fetch_open_orders: true,
        }
    }

    fn load_markets(&self) -> Result<HashMap<String, Market>> {
        Ok(self.state.lock().unwrap().markets.clone())
    }

    fn fetch_balance(&self) -> Result<HashMap<String, Balance>> {
        Ok(self.state.lock().unwrap().balances.clone())
    }

    fn fetch_ticker(&self, symbol: &str) -> Result<Decimal> {
        let state = self.state.lock().unwrap();
        let (bids, asks) = state
            .books
            .get(symbol)
            .ok_or_else(|| AdapterError::ExchangeUnavailable(format!("no book for {symbol}")))?;
        let bid = bids.first().map(|(p, _)| *p).unwrap_or(Decimal::ZERO);
        let ask = asks.first().map(|(p, _)| *p).unwrap_or(Decimal::ZERO);
        Ok((bid + ask) / Decimal::TWO)
    }

    fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        let mut out = HashMap::new();
        for s in symbols {
            if let Ok(p) = self.fetch_ticker(s) {
                out.insert(s.clone(), p);
            }
        }
        Ok(out)
    }

    fn fetch_order_book(&self, symbol: &str, limit: u32) -> Result<OrderBookSnapshot> {
        let state = self.state.lock().unwrap();
        let (bids, asks) = state
            .books
            .get(symbol)
            .cloned()
            .ok_or_else(|| AdapterError::ExchangeUnavailable(format!("no book for {symbol}")))?;
        let limit = limit as usize;
        Ok(OrderBookSnapshot {
            bids: bids.into_iter().take(limit).collect(),
            asks: asks.into_iter().take(limit).collect(),
            timestamp: None,
        })
    }

    fn create_order(&self, symbol: &str, side: Side, amount: Decimal, price: Decimal) -> Result<Order> {
        if matches!(self.fill_mode, FillMode::Reject) {
            return Err(AdapterError::InvalidOrder("mock: order rejected".into()));
        }
        let mut state = self.state.lock().unwrap();
        let id = state.next_id.to_string();
        state.next_id += 1;
        let status = if matches!(self.fill_mode, FillMode::ImmediateFull) {
            OrderStatus::Closed
        } else {
            OrderStatus::Open
        };
        let remaining = if matches!(self.fill_mode, FillMode::ImmediateFull) {
            Decimal::ZERO
        } else {
            amount
        };
        let order = Order {
            id: id.clone(),
            symbol: symbol.to_string(),
            side,
            price,
            amount,
            remaining,
            status,
            raw: serde_json::json!({ "mock": true }),
        };
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    fn cancel_order(&self, id: &str, _symbol: &str, _side: Side) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.orders.get_mut(id) {
            Some(order) if order.status == OrderStatus::Open => {
                order.status = OrderStatus::Cancelled;
                Ok(())
            }
            Some(_) => Err(AdapterError::OrderNotFound(id.to_string())),
            None => Err(AdapterError::OrderNotFound(id.to_string())),
        }
    }

    fn fetch_order(&self, id: &str, _symbol: &str) -> Result<Order> {
        self.state
            .lock()
            .unwrap()
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| AdapterError::OrderNotFound(id.to_string()))
    }

    fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.symbol == symbol && o.status == OrderStatus::Open)
            .cloned()
            .collect())
    }
}

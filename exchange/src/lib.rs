//! Exchange adapters for the spot portfolio rebalancer.
//!
//! [`ExchangeAdapter`] is the single capability interface the engine
//! drives — one implementation per exchange, selected at startup from
//! config rather than dispatched on at every call site. `binance`
//! implements it against the real REST API; `mock` implements it
//! in-memory for tests.

pub mod adapter;
pub mod binance;
pub mod error;
pub mod mock;

pub use adapter::{Capabilities, ExchangeAdapter};
pub use error::AdapterError;

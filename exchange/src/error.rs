//! The exchange-facing error taxonomy. Exchange-native error codes and
//! transport failures are translated into these variants at the adapter
//! boundary — nothing downstream ever matches on an HTTP status code or
//! a `reqwest`/`serde_json` error directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credentials missing or rejected by the exchange.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Price/amount precision or minimums violated.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// The order id is unknown to the exchange — it was either filled
    /// or cancelled externally. This is a signal, not a failure: it
    /// drives the engine's reconcile path.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Balance insufficient to place or maintain the order.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Exchange rate limit hit; caller should back off and retry.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network failure, 5xx, or other condition expected to clear on
    /// retry. Counted against the worker's error budget.
    #[error("transient error: {0}")]
    Transient(String),

    /// The exchange is reachable but refused to service the request in
    /// a way that doesn't fit the other variants (unexpected payload
    /// shape, unsupported operation).
    #[error("exchange unavailable: {0}")]
    ExchangeUnavailable(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            AdapterError::Transient(e.to_string())
        } else {
            AdapterError::ExchangeUnavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        AdapterError::ExchangeUnavailable(format!("response decode failed: {e}"))
    }
}

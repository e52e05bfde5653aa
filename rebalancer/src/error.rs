//! Error types for the rebalancer service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] rebalancer_core::ConfigError),

    #[error(transparent)]
    Adapter(#[from] rebalancer_exchange::AdapterError),

    #[error("{asset} is not in the configured universe")]
    NotInUniverse { asset: String },

    #[error("no portfolio configured for exchange {0}")]
    UnknownExchange(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),

    #[error("notification error: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, Error>;

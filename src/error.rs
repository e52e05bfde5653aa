//! Shared error taxonomy.
//!
//! `ConfigError` lives here because the `Config` type lives here; the
//! adapter/engine taxonomy (`AuthError`, `InvalidOrder`, `OrderNotFound`,
//! ...) lives in `rebalancer-exchange`, which is the crate that actually
//! talks to exchanges and needs to translate their error codes.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

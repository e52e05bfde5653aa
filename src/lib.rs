//! # rebalancer-core
//!
//! Shared types, order-book pricing math, and configuration loading for
//! the webhook-driven spot portfolio rebalancer. This crate has no
//! network or threading concerns of its own — it is the pure,
//! deterministic core that `rebalancer-exchange` and `rebalancer` build
//! on.
//!
//! ## Pricing
//!
//! ```
//! use rebalancer_core::pricing::{calculate_limit_buy_price, calculate_limit_sell_price};
//! use rebalancer_core::types::LimitOrderStrategy;
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//!
//! let bids = vec![(Decimal::from_str("100.00").unwrap(), Decimal::from_str("1").unwrap())];
//! let weights: Vec<Decimal> = ["4", "2", "1", "1", "0", "0"].iter().map(|s| s.parse().unwrap()).collect();
//! let price = calculate_limit_buy_price(&bids, LimitOrderStrategy::BestBidOrAsk, Decimal::from_str("0.01").unwrap(), &weights, None);
//! assert_eq!(price, Decimal::from_str("100.00").unwrap());
//! ```

pub mod config;
pub mod error;
pub mod pricing;
pub mod types;

pub use config::Config;
pub use error::ConfigError;

//! `config.json` loading and validation.
//!
//! Loaded once at startup, validated, and handed to the rest of the
//! process as an immutable value — no lazily-initialized global.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Default `orderbook_weights` when the key is absent from the file:
/// weight 4 for the synthetic best level, then 2/1/1/0/0 for the next
/// four depth levels.
pub fn default_orderbook_weights() -> Vec<Decimal> {
    ["4", "2", "1", "1", "0", "0"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub base_asset: String,
    pub universe: Vec<String>,
    pub fee: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    orderbook_weights: Option<Vec<Decimal>>,
    #[serde(flatten)]
    exchanges: HashMap<String, ExchangeConfig>,
}

/// Top-level, process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchanges: HashMap<String, ExchangeConfig>,
    pub orderbook_weights: Vec<Decimal>,
}

impl Config {
    /// Read `path`, parse as JSON, and validate. Any failure here is a
    /// fatal startup error (`ConfigError`).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Config {
            exchanges: raw.exchanges,
            orderbook_weights: raw.orderbook_weights.unwrap_or_else(default_orderbook_weights),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one exchange".into(),
            ));
        }
        if self.orderbook_weights.len() != 6 {
            return Err(ConfigError::Invalid(
                "orderbook_weights must have exactly 6 entries".into(),
            ));
        }
        if self.orderbook_weights.iter().any(|w| *w < Decimal::ZERO) {
            return Err(ConfigError::Invalid(
                "orderbook_weights entries must be non-negative".into(),
            ));
        }
        for (name, exchange) in &self.exchanges {
            if exchange.base_asset.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "exchange {name}: base_asset must not be empty"
                )));
            }
            if exchange.universe.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "exchange {name}: universe must not be empty"
                )));
            }
            if exchange.fee < Decimal::ZERO || exchange.fee >= Decimal::ONE {
                return Err(ConfigError::Invalid(format!(
                    "exchange {name}: fee must be in [0, 1)"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn example_json() -> &'static str {
        r#"
        {
            "binance": {
                "base_asset": "USDT",
                "universe": ["BTC", "ETH", "SOL"],
                "fee": 0.0025
            },
            "orderbook_weights": [4, 2, 1, 1, 0, 0]
        }
        "#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::parse(example_json(), &PathBuf::from("config.json")).unwrap();
        assert_eq!(config.exchanges.len(), 1);
        let binance = &config.exchanges["binance"];
        assert_eq!(binance.base_asset, "USDT");
        assert_eq!(binance.universe, vec!["BTC", "ETH", "SOL"]);
        assert_eq!(config.orderbook_weights.len(), 6);
    }

    #[test]
    fn missing_orderbook_weights_defaults() {
        let json = r#"{"binance": {"base_asset": "USDT", "universe": ["BTC"], "fee": 0.001}}"#;
        let config = Config::parse(json, &PathBuf::from("config.json")).unwrap();
        assert_eq!(config.orderbook_weights, default_orderbook_weights());
    }

    #[test]
    fn empty_universe_is_rejected() {
        let json = r#"{"binance": {"base_asset": "USDT", "universe": [], "fee": 0.001}}"#;
        assert!(Config::parse(json, &PathBuf::from("config.json")).is_err());
    }

    #[test]
    fn fee_out_of_range_is_rejected() {
        let json = r#"{"binance": {"base_asset": "USDT", "universe": ["BTC"], "fee": 1.2}}"#;
        assert!(Config::parse(json, &PathBuf::from("config.json")).is_err());
    }

    #[test]
    fn wrong_weight_count_is_rejected() {
        let json = r#"{"binance": {"base_asset": "USDT", "universe": ["BTC"], "fee": 0.001}, "orderbook_weights": [1,2,3]}"#;
        assert!(Config::parse(json, &PathBuf::from("config.json")).is_err());
    }

    #[test]
    fn no_exchanges_is_rejected() {
        assert!(Config::parse("{}", &PathBuf::from("config.json")).is_err());
    }
}

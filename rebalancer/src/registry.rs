//! Process-wide map of exchange name → adapter + portfolio. Constructed
//! once in `main`, after `Config` has loaded and before the HTTP
//! listener binds, and handed to the web layer as shared state behind
//! an `Arc` — no lazily-initialized global.

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, warn};
use rebalancer_core::config::Config;
use rebalancer_core::types::{LimitOrderStrategy, Side};
use rebalancer_exchange::binance::BinanceAdapter;
use rebalancer_exchange::ExchangeAdapter;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::audit::AuditLog;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::portfolio::{Portfolio, PortfolioBalance};

/// API credentials for one exchange, read from `<EXCHANGE>_API_KEY` /
/// `<EXCHANGE>_API_SECRET` environment variables.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Reads credentials for every exchange named in `config` from the
/// process environment. An exchange with no `_API_KEY` set is omitted
/// — `MarketRegistry::new` then skips constructing a portfolio for it,
/// matching scenario 6's "credential missing" behavior.
pub fn load_credentials_from_env(exchange_names: impl Iterator<Item = String>) -> HashMap<String, Credentials> {
    let mut out = HashMap::new();
    for name in exchange_names {
        let upper = name.to_uppercase();
        let api_key = std::env::var(format!("{upper}_API_KEY")).ok();
        let api_secret = std::env::var(format!("{upper}_API_SECRET")).ok();
        if let (Some(api_key), Some(api_secret)) = (api_key, api_secret) {
            out.insert(name, Credentials { api_key, api_secret });
        }
    }
    out
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum BalanceOrError {
    Balance(PortfolioBalance),
    Error(&'static str),
}

#[derive(Serialize)]
pub struct RegistryBalance {
    pub total: HashMap<String, Decimal>,
    pub exchanges: HashMap<String, BalanceOrError>,
}

pub struct MarketRegistry {
    portfolios: HashMap<String, Arc<Portfolio>>,
    strategy: LimitOrderStrategy,
    weights: Vec<Decimal>,
}

impl MarketRegistry {
    /// For each configured exchange with credentials present, builds
    /// an adapter and a `Portfolio` and stores them keyed by exchange
    /// name. An exchange whose adapter or portfolio construction fails
    /// is logged and skipped — it never aborts startup, matching the
    /// other exchanges' balances still being reachable.
    pub fn new(config: &Config, credentials: &HashMap<String, Credentials>) -> Self {
        let mut portfolios = HashMap::new();

        for (name, exchange_config) in &config.exchanges {
            let Some(creds) = credentials.get(name) else {
                warn!("{name}: no API credentials in the environment, exchange will not be traded");
                continue;
            };

            let adapter: Arc<dyn ExchangeAdapter> = match name.as_str() {
                "binance" => Arc::new(BinanceAdapter::new(&creds.api_key, &creds.api_secret, false)),
                other => {
                    error!("{other}: no adapter implementation for this exchange name, skipping");
                    continue;
                }
            };

            match Portfolio::new(name, adapter, exchange_config) {
                Ok(portfolio) => {
                    portfolios.insert(name.clone(), Arc::new(portfolio));
                }
                Err(e) => error!("{name}: failed to initialize portfolio: {e}"),
            }
        }

        Self {
            portfolios,
            strategy: LimitOrderStrategy::WeightedAverage,
            weights: config.orderbook_weights.clone(),
        }
    }

    /// Dispatches an inbound signal to the named exchange's portfolio.
    /// Returns `UnknownExchange` if no portfolio was constructed for
    /// it (missing credentials or unsupported adapter at startup).
    pub fn send_order(
        &self,
        exchange: &str,
        symbol: &str,
        side: Side,
        audit: &Arc<AuditLog>,
        notifier: &Arc<dyn Notifier>,
    ) -> Result<()> {
        let portfolio = self
            .portfolios
            .get(exchange)
            .ok_or_else(|| Error::UnknownExchange(exchange.to_string()))?;

        let asset = symbol.strip_suffix(portfolio.base_asset()).unwrap_or(symbol);
        portfolio.send_order(audit, notifier, asset, side, self.strategy, &self.weights)
    }

    /// Stops every worker on every configured exchange. Called from
    /// `main`'s SIGINT/SIGTERM handler before the process exits 0.
    pub fn shutdown(&self, notifier: &Arc<dyn Notifier>) {
        for portfolio in self.portfolios.values() {
            portfolio.shutdown(notifier.as_ref());
        }
    }

    /// Balance for every configured exchange; a per-exchange failure
    /// yields an `"Error"` placeholder rather than aborting the whole
    /// response, and `total` sums only the exchanges that succeeded.
    pub fn get_balance(&self) -> RegistryBalance {
        let mut total: HashMap<String, Decimal> = HashMap::new();
        let mut exchanges = HashMap::new();

        for (name, portfolio) in &self.portfolios {
            match portfolio.get_portfolio_balance() {
                Ok(balance) => {
                    *total.entry(balance.base_asset.clone()).or_insert(Decimal::ZERO) += balance.total;
                    exchanges.insert(name.clone(), BalanceOrError::Balance(balance));
                }
                Err(e) => {
                    warn!("{name}: balance fetch failed: {e}");
                    exchanges.insert(name.clone(), BalanceOrError::Error("Error"));
                }
            }
        }

        RegistryBalance { total, exchanges }
    }
}

//! Per-exchange portfolio: balances, holding weights, and the available
//! base-asset budget for a given buy. One [`Portfolio`] wraps one
//! [`ExchangeAdapter`] and is shared across that exchange's per-asset
//! worker threads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rebalancer_core::config::ExchangeConfig;
use rebalancer_core::types::{LimitOrderStrategy, Market, Side};
use rebalancer_exchange::ExchangeAdapter;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::audit::AuditLog;
use crate::engine::WorkerRegistry;
use crate::error::{Error, Result};
use crate::notify::Notifier;

/// `amount > min_amount OR cost > 1.2 * min_cost` — the minimum-size
/// gate applied to both the buy and sell paths of `send_order`.
const MIN_COST_SLACK: Decimal = Decimal::from_parts(12, 0, 0, false, 1); // 1.2

/// Quote assets excluded from the holding-weight and balance-report
/// computations — cash, not a position to rebalance.
const STABLECOINS: [&str; 4] = ["USDT", "BUSD", "USD", "THB"];

const NEAR_ZERO_BALANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 5); // 0.00005
const NEAR_ZERO_VALUE: Decimal = Decimal::ONE;

#[derive(Debug, Clone, Serialize)]
pub struct AssetBalance {
    pub amount: Decimal,
    pub price: Decimal,
    pub value: Decimal,
    pub weight: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioBalance {
    pub base_asset: String,
    pub base_amount: Decimal,
    pub assets: HashMap<String, AssetBalance>,
    pub total: Decimal,
}

struct HoldingState {
    weight: HashMap<String, Decimal>,
    total_weight: Decimal,
}

pub struct Portfolio {
    exchange_name: String,
    adapter: Arc<dyn ExchangeAdapter>,
    base_asset: String,
    universe: Vec<String>,
    fee: Decimal,
    markets: HashMap<String, Market>,
    allocation: HashMap<String, Decimal>,
    holding: Mutex<HoldingState>,
    workers: Arc<WorkerRegistry>,
}

impl Portfolio {
    pub fn new(exchange_name: &str, adapter: Arc<dyn ExchangeAdapter>, config: &ExchangeConfig) -> Result<Self> {
        let markets = adapter.load_markets()?;
        let weight = Decimal::ONE / Decimal::from(config.universe.len().max(1) as u64);
        let allocation = config
            .universe
            .iter()
            .map(|asset| (asset.clone(), weight))
            .collect();

        Ok(Self {
            exchange_name: exchange_name.to_string(),
            adapter,
            base_asset: config.base_asset.clone(),
            universe: config.universe.clone(),
            fee: config.fee,
            markets,
            allocation,
            holding: Mutex::new(HoldingState {
                weight: HashMap::new(),
                total_weight: Decimal::ZERO,
            }),
            workers: Arc::new(WorkerRegistry::new()),
        })
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    pub fn base_asset(&self) -> &str {
        &self.base_asset
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub fn fee(&self) -> Decimal {
        self.fee
    }

    pub fn adapter(&self) -> &Arc<dyn ExchangeAdapter> {
        &self.adapter
    }

    pub fn symbol_for(&self, asset: &str) -> String {
        Market::canonical_symbol(asset, &self.base_asset)
    }

    pub fn market(&self, asset: &str) -> Option<&Market> {
        self.markets.get(&self.symbol_for(asset))
    }

    pub fn min_trade_amount(&self, asset: &str) -> Result<(Decimal, Decimal)> {
        let symbol = self.symbol_for(asset);
        let market = self
            .markets
            .get(&symbol)
            .ok_or_else(|| Error::NotInUniverse { asset: asset.to_string() })?;
        Ok((market.min_amount, market.min_cost))
    }

    pub fn price(&self, asset: &str) -> Result<Decimal> {
        Ok(self.adapter.fetch_ticker(&self.symbol_for(asset))?)
    }

    /// Last price for every asset in `assets`, fetched in one batched
    /// `FetchTickers` round trip rather than one call per asset. An
    /// asset missing from the adapter's response (symbol delisted,
    /// exchange omitted it) is simply absent from the returned map —
    /// callers skip it rather than treating it as zero.
    fn prices_for(&self, assets: &[String]) -> Result<HashMap<String, Decimal>> {
        let symbols: Vec<String> = assets.iter().map(|a| self.symbol_for(a)).collect();
        let by_symbol = self.adapter.fetch_tickers(&symbols)?;
        Ok(assets
            .iter()
            .filter_map(|asset| by_symbol.get(&self.symbol_for(asset)).map(|p| (asset.clone(), *p)))
            .collect())
    }

    /// Recomputes holding weights for every asset in the universe from
    /// fresh balances and prices.
    pub fn compute_holding_weight(&self) -> Result<()> {
        let base_balance = self.balance_of(&self.base_asset)?;
        let prices = self.prices_for(&self.universe)?;
        let mut total_asset_value = base_balance;
        let mut market_value = HashMap::new();

        for asset in &self.universe {
            let balance = self.balance_of(asset)?;
            let price = prices.get(asset).copied().unwrap_or(Decimal::ZERO);
            let value = balance * price;
            market_value.insert(asset.clone(), value);
            total_asset_value += value;
        }

        let mut holding = self.holding.lock().unwrap();
        holding.total_weight = Decimal::ZERO;
        for (asset, value) in market_value {
            let w = if total_asset_value > Decimal::ZERO {
                value / total_asset_value
            } else {
                Decimal::ZERO
            };
            holding.weight.insert(asset, w);
            holding.total_weight += w;
        }
        Ok(())
    }

    fn balance_of(&self, asset: &str) -> Result<Decimal> {
        let balances = self.adapter.fetch_balance()?;
        Ok(balances.get(asset).map(|b| b.free).unwrap_or(Decimal::ZERO))
    }

    /// Base-asset budget available to buy `asset` right now: zero once
    /// the asset is already at or above its target allocation, otherwise
    /// a share of idle base balance proportional to how under-allocated
    /// it is relative to the rest of the under-allocated universe.
    pub fn available_base_balance_for_asset(&self, asset: &str) -> Result<Decimal> {
        let target = *self
            .allocation
            .get(asset)
            .ok_or_else(|| Error::NotInUniverse { asset: asset.to_string() })?;

        let holding = self.holding.lock().unwrap();
        let current = holding.weight.get(asset).copied().unwrap_or(Decimal::ZERO);
        if current > target * Decimal::new(99, 2) {
            return Ok(Decimal::ZERO);
        }
        if target <= current {
            return Ok(Decimal::ZERO);
        }
        let available_weight = Decimal::ONE - holding.total_weight;
        drop(holding);

        let base_balance = self.balance_of(&self.base_asset)?;
        if available_weight <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let w = ((target - current) / available_weight).min(Decimal::ONE);
        Ok(w * base_balance)
    }

    /// A snapshot of current holdings, stripped of stablecoin cash
    /// positions and near-zero dust, for the `/balance` endpoint.
    pub fn get_portfolio_balance(&self) -> Result<PortfolioBalance> {
        if self.universe.len() > 1 {
            self.compute_holding_weight()?;
        }

        let balances = self.adapter.fetch_balance()?;
        let asset_list: Vec<String> = balances
            .keys()
            .filter(|a| !STABLECOINS.contains(&a.as_str()))
            .cloned()
            .collect();

        let base_amount = balances.get(&self.base_asset).map(|b| b.free).unwrap_or(Decimal::ZERO);
        let prices = self.prices_for(&asset_list)?;
        let mut total = base_amount;
        let mut assets = HashMap::new();
        let holding = self.holding.lock().unwrap();

        for asset in &asset_list {
            let Some(balance) = balances.get(asset) else { continue };
            let amount = if balance.free > NEAR_ZERO_BALANCE { balance.free } else { Decimal::ZERO };
            let Some(&price) = prices.get(asset) else { continue };
            let value = amount * price;
            if value < NEAR_ZERO_VALUE {
                continue;
            }
            let weight = if asset_list.len() > 1 {
                holding.weight.get(asset).copied()
            } else {
                None
            };
            assets.insert(asset.clone(), AssetBalance { amount, price, value, weight });
            total += value;
        }

        Ok(PortfolioBalance {
            base_asset: self.base_asset.clone(),
            base_amount,
            assets,
            total,
        })
    }

    /// Stops every worker this portfolio is currently running. Called
    /// once, from `main`'s shutdown handler.
    pub fn shutdown(&self, notifier: &dyn Notifier) {
        self.workers.stop_all(notifier);
    }

    /// The gate: stops any worker already running for `asset`, sweeps
    /// its resting orders, sizes a fresh order against the current
    /// minimums, and — if it clears them — launches a new worker.
    /// Returns `Ok(())` both when a worker is launched and when the
    /// signal is silently dropped for being under the minimum; only a
    /// malformed asset or an adapter failure is an `Err`.
    pub fn send_order(
        self: &Arc<Self>,
        audit: &Arc<AuditLog>,
        notifier: &Arc<dyn Notifier>,
        asset: &str,
        side: Side,
        strategy: LimitOrderStrategy,
        weights: &[Decimal],
    ) -> Result<()> {
        let _ = crate::audit::webhook_received(audit, &self.exchange_name, asset, &side.to_string());

        self.workers.stop_existing(asset, notifier.as_ref());
        crate::engine::cancel_open_orders(self, asset, side);

        match side {
            Side::Buy => self.send_buy_order(audit, notifier, asset, strategy, weights),
            Side::Sell => self.send_sell_order(audit, notifier, asset, strategy, weights),
        }
    }

    fn send_buy_order(
        self: &Arc<Self>,
        audit: &Arc<AuditLog>,
        notifier: &Arc<dyn Notifier>,
        asset: &str,
        strategy: LimitOrderStrategy,
        weights: &[Decimal],
    ) -> Result<()> {
        if !self.universe.iter().any(|a| a == asset) {
            return Err(Error::NotInUniverse { asset: asset.to_string() });
        }
        if self.universe.len() > 1 {
            self.compute_holding_weight()?;
        }

        let base_budget = self.available_base_balance_for_asset(asset)? * (Decimal::ONE - self.fee);
        let price = self.price(asset)?;
        let asset_amount = if price.is_zero() { Decimal::ZERO } else { base_budget / price };
        let (min_amount, min_cost) = self.min_trade_amount(asset)?;

        if asset_amount <= min_amount && base_budget <= min_cost * MIN_COST_SLACK {
            notifier.notify(&format!(
                "{asset}: buy budget {base_budget} {} is below the exchange minimum, skipping",
                self.base_asset
            ));
            let _ = crate::audit::order_size_too_low(audit, &self.symbol_for(asset), "buy");
            return Ok(());
        }

        crate::engine::spawn_worker(
            self.workers.clone(),
            self.clone(),
            audit.clone(),
            notifier.clone(),
            asset.to_string(),
            Side::Buy,
            base_budget,
            strategy,
            weights.to_vec(),
        );
        Ok(())
    }

    fn send_sell_order(
        self: &Arc<Self>,
        audit: &Arc<AuditLog>,
        notifier: &Arc<dyn Notifier>,
        asset: &str,
        strategy: LimitOrderStrategy,
        weights: &[Decimal],
    ) -> Result<()> {
        let available = self.balance_of(asset)?;
        let price = self.price(asset)?;
        let cost = available * price;
        let (min_amount, min_cost) = self.min_trade_amount(asset)?;

        if available <= min_amount && cost <= min_cost * MIN_COST_SLACK {
            notifier.notify(&format!("{asset}: sell amount {available} is below the exchange minimum, skipping"));
            let _ = crate::audit::order_size_too_low(audit, &self.symbol_for(asset), "sell");
            return Ok(());
        }

        crate::engine::spawn_worker(
            self.workers.clone(),
            self.clone(),
            audit.clone(),
            notifier.clone(),
            asset.to_string(),
            Side::Sell,
            available,
            strategy,
            weights.to_vec(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalancer_exchange::mock::MockExchange;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            base_asset: "USDT".to_string(),
            universe: vec!["BTC".to_string(), "ETH".to_string()],
            fee: dec("0.001"),
        }
    }

    fn built_portfolio() -> (Portfolio, Arc<MockExchange>) {
        let mock = Arc::new(MockExchange::new("mock"));
        mock.set_market(Market {
            symbol: "BTC/USDT".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            price_precision: dec("0.01"),
            amount_precision: 8,
            min_amount: dec("0.0001"),
            min_cost: dec("10"),
        });
        mock.set_market(Market {
            symbol: "ETH/USDT".to_string(),
            base: "ETH".to_string(),
            quote: "USDT".to_string(),
            price_precision: dec("0.01"),
            amount_precision: 8,
            min_amount: dec("0.001"),
            min_cost: dec("10"),
        });
        let portfolio = Portfolio::new("mock", mock.clone(), &config()).unwrap();
        (portfolio, mock)
    }

    #[test]
    fn equal_weight_allocation_is_one_over_universe_len() {
        let (portfolio, _mock) = built_portfolio();
        assert_eq!(*portfolio.allocation.get("BTC").unwrap(), dec("0.5"));
        assert_eq!(*portfolio.allocation.get("ETH").unwrap(), dec("0.5"));
    }

    #[test]
    fn available_base_is_error_for_unknown_asset() {
        let (portfolio, _mock) = built_portfolio();
        assert!(portfolio.available_base_balance_for_asset("DOGE").is_err());
    }

    #[test]
    fn portfolio_balance_excludes_stablecoins_and_dust() {
        let (portfolio, mock) = built_portfolio();
        mock.set_balance("USDT", rebalancer_core::types::Balance { free: dec("1000"), used: Decimal::ZERO });
        mock.set_balance("BTC", rebalancer_core::types::Balance { free: dec("0.01"), used: Decimal::ZERO });
        mock.set_order_book("BTC/USDT", vec![(dec("50000"), dec("1"))], vec![(dec("50001"), dec("1"))]);
        mock.set_order_book("ETH/USDT", vec![(dec("3000"), dec("1"))], vec![(dec("3001"), dec("1"))]);

        let balance = portfolio.get_portfolio_balance().unwrap();
        assert_eq!(balance.base_asset, "USDT");
        assert_eq!(balance.base_amount, dec("1000"));
        assert!(balance.assets.contains_key("BTC"));
        assert!(!balance.assets.contains_key("USDT"), "stablecoin must not appear as a held asset");
    }
}

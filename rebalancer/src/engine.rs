//! Per-asset order execution: one dedicated OS thread per in-flight
//! order, cycling through `PLACING → (REPLACING | RECONCILING)* → EXIT`
//! until the order fills, the worker is asked to stop, or the adapter
//! reports an unrecoverable error.
//!
//! One thread per worker (rather than async tasks) mirrors the
//! `threading.Thread`-per-asset model this engine is translated from:
//! each worker blocks on its adapter's blocking HTTP calls and sleeps
//! between polls, so there is no shared event loop to starve.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};
use rebalancer_core::pricing::{self, CurrentOrderRef};
use rebalancer_core::types::{LimitOrderStrategy, Order, OrderStatus, Side};
use rust_decimal::Decimal;

use crate::audit::AuditLog;
use crate::notify::Notifier;
use crate::portfolio::Portfolio;

/// How long `stop_existing` waits for the previous worker to observe
/// its stop flag and exit before it emits a "this is taking a while"
/// notification. The wait itself is unbounded past this point — the
/// at-most-one-worker invariant must hold regardless.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// How long a worker sleeps between book polls while an order rests
/// unchanged, and after placing or replacing an order.
const POLL_INTERVAL: Duration = Duration::from_millis(750);
/// How long a worker sleeps between polls when it only refreshed order
/// status rather than replacing the order (the hot path).
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Backoff after a transient adapter error (network, 5xx, unclear
/// create/cancel/fetch failure) before the next retry.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// How many transient errors a worker tolerates before giving up and
/// notifying, rather than retrying forever. The legacy system used
/// separate buy/sell budgets (~10/~4); a single bound covers both.
const ERROR_BUDGET: u32 = 8;

/// How often a single asset's worker is allowed to notify about a fresh
/// limit placement — the book can shift every poll, and a notification
/// per replace would flood the channel, so only the first placement in
/// any 5s window reaches the user.
const PLACEMENT_NOTIFY_INTERVAL: Duration = Duration::from_secs(5);

/// Signalled by the worker thread itself just before it returns, so
/// `stop_existing` can wait on it with a timeout — a plain `JoinHandle`
/// has no timed-join primitive in `std`.
type DoneSignal = Arc<(Mutex<bool>, Condvar)>;

struct WorkerHandle {
    stop: Arc<std::sync::atomic::AtomicBool>,
    done: DoneSignal,
    join: JoinHandle<()>,
}

/// Tracks the single in-flight worker per asset, so a new webhook signal
/// for an asset already being worked can stop the old worker before
/// starting a new one — mirroring the original's `threads`/`stop_worker`
/// dictionaries.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: Mutex<HashMap<String, WorkerHandle>>,
    /// Per-asset last-notification timestamp: survives across a single
    /// asset's worker being replaced, so a rapid sequence of
    /// stop/restart/replace cycles still only notifies once per
    /// [`PLACEMENT_NOTIFY_INTERVAL`].
    last_notified: Mutex<HashMap<String, Instant>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a "new limit placed" notification for `asset` should go
    /// out now. Always true the first time; afterward, true only once
    /// per [`PLACEMENT_NOTIFY_INTERVAL`]. Updates the timestamp as a
    /// side effect of returning `true`.
    fn should_notify_placement(&self, asset: &str) -> bool {
        let mut last_notified = self.last_notified.lock().unwrap();
        let now = Instant::now();
        let should_send = match last_notified.get(asset) {
            Some(last) => now.duration_since(*last) >= PLACEMENT_NOTIFY_INTERVAL,
            None => true,
        };
        if should_send {
            last_notified.insert(asset.to_string(), now);
        }
        should_send
    }

    /// Stop and join any worker already running for `asset`. Waits up
    /// to [`STOP_GRACE_PERIOD`] before notifying that the previous
    /// worker is slow to exit, then keeps waiting — the caller must
    /// never observe two workers for the same asset.
    pub fn stop_existing(&self, asset: &str, notifier: &dyn Notifier) {
        let handle = self.workers.lock().unwrap().remove(asset);
        if let Some(handle) = handle {
            info!("{asset} worker is running, stopping it");
            handle.stop.store(true, std::sync::atomic::Ordering::SeqCst);

            let (lock, cvar) = &*handle.done;
            let guard = lock.lock().unwrap();
            let (guard, result) = cvar.wait_timeout_while(guard, STOP_GRACE_PERIOD, |done| !*done).unwrap();
            if result.timed_out() {
                notifier.notify(&format!("{asset}: still waiting for the previous worker to stop"));
                let _ = cvar.wait_while(guard, |done| !*done).unwrap();
            }

            let _ = handle.join.join();
        }
    }

    pub fn is_running(&self, asset: &str) -> bool {
        self.workers.lock().unwrap().contains_key(asset)
    }

    /// Stops and joins every currently running worker. Used on process
    /// shutdown so a SIGINT/SIGTERM exits 0 only after every worker has
    /// observed its stop flag, per §6's exit-code contract.
    pub fn stop_all(&self, notifier: &dyn Notifier) {
        let assets: Vec<String> = self.workers.lock().unwrap().keys().cloned().collect();
        for asset in assets {
            self.stop_existing(&asset, notifier);
        }
    }

    fn register(&self, asset: &str, handle: WorkerHandle) {
        self.workers.lock().unwrap().insert(asset.to_string(), handle);
    }

    fn deregister(&self, asset: &str) {
        self.workers.lock().unwrap().remove(asset);
    }
}

/// Spawns the worker thread for one asset's limit order, after the
/// caller has already cancelled any conflicting resting orders and
/// validated the trade against minimums.
///
/// `amount` is the base amount for a buy, the quote (asset) amount for
/// a sell — matching [`rebalancer_core::pricing::calculate_initial_buy_price`]
/// and [`rebalancer_core::pricing::calculate_initial_sell_price`].
#[allow(clippy::too_many_arguments)]
pub fn spawn_worker(
    registry: Arc<WorkerRegistry>,
    portfolio: Arc<Portfolio>,
    audit: Arc<AuditLog>,
    notifier: Arc<dyn Notifier>,
    asset: String,
    side: Side,
    amount: Decimal,
    strategy: LimitOrderStrategy,
    weights: Vec<Decimal>,
) {
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_for_thread = stop.clone();
    let done: DoneSignal = Arc::new((Mutex::new(false), Condvar::new()));
    let done_for_thread = done.clone();
    let registry_for_thread = registry.clone();
    let asset_for_thread = asset.clone();

    let registry_for_worker = registry.clone();
    let join = thread::spawn(move || {
        run_worker(
            &registry_for_worker,
            &portfolio,
            &audit,
            notifier.as_ref(),
            &stop_for_thread,
            &asset_for_thread,
            side,
            amount,
            strategy,
            &weights,
        );
        registry_for_thread.deregister(&asset_for_thread);
        let (lock, cvar) = &*done_for_thread;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    });

    registry.register(&asset, WorkerHandle { stop, done, join });
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    registry: &WorkerRegistry,
    portfolio: &Portfolio,
    audit: &AuditLog,
    notifier: &dyn Notifier,
    stop: &std::sync::atomic::AtomicBool,
    asset: &str,
    side: Side,
    amount: Decimal,
    strategy: LimitOrderStrategy,
    weights: &[Decimal],
) {
    let symbol = portfolio.symbol_for(asset);
    let adapter = portfolio.adapter();
    let tick_size = match portfolio.market(asset) {
        Some(m) => m.tick_size(),
        None => {
            let _ = crate::audit::worker_error(audit, &symbol, "unknown market");
            return;
        }
    };

    // PLACING: compute the initial price/amount and submit.
    let book = match adapter.fetch_order_book(&symbol, 20) {
        Ok(b) => b,
        Err(e) => {
            let _ = crate::audit::worker_error(audit, &symbol, &e.to_string());
            return;
        }
    };

    let (price, mut remaining) = match side {
        Side::Buy => pricing::calculate_initial_buy_price(&book.bids, amount, tick_size, strategy, weights),
        Side::Sell => {
            let price = pricing::calculate_initial_sell_price(&book.asks, amount, tick_size, strategy, weights);
            (price, amount)
        }
    };

    let mut order = match adapter.create_order(&symbol, side, remaining, price) {
        Ok(o) => o,
        Err(e) => {
            notifier.notify(&format!("failed to place order: {e}"));
            let _ = crate::audit::worker_error(audit, &symbol, &e.to_string());
            return;
        }
    };
    let _ = crate::audit::order_placed(audit, &symbol, &side.to_string(), &price.to_string(), &remaining.to_string());
    if registry.should_notify_placement(asset) {
        notifier.notify(&format!("new limit order: {side} {symbol} @ {price} amount {remaining}"));
    }

    thread::sleep(POLL_INTERVAL);

    let mut fully_filled = false;
    let mut gave_up = false;
    let mut error_count: u32 = 0;

    macro_rules! count_error_or_give_up {
        ($msg:expr) => {{
            error_count += 1;
            if error_count > ERROR_BUDGET {
                let message = format!("{symbol}: giving up after {error_count} errors: {}", $msg);
                notifier.notify(&message);
                let _ = crate::audit::worker_error(audit, &symbol, &message);
                gave_up = true;
                break;
            }
        }};
    }

    while !stop.load(std::sync::atomic::Ordering::SeqCst) {
        let book = match adapter.fetch_order_book(&symbol, 20) {
            Ok(b) => b,
            Err(e) => {
                warn!("{symbol}: failed to fetch order book: {e}");
                count_error_or_give_up!(e.to_string());
                thread::sleep(ERROR_BACKOFF);
                continue;
            }
        };

        let book_side: &[rebalancer_core::types::Level] = match side {
            Side::Buy => &book.bids,
            Side::Sell => &book.asks,
        };
        let current = CurrentOrderRef::from_order(&order);
        let target_price =
            pricing::calculate_target_price(book_side, remaining, side, tick_size, strategy, weights, current);
        let target_price = pricing::quantize(target_price, tick_size);

        if target_price != order.price {
            let target_amount = if matches!(side, Side::Buy) {
                remaining * order.price / target_price
            } else {
                remaining
            };

            match adapter.cancel_order(&order.id, &symbol, side) {
                Ok(()) => match adapter.create_order(&symbol, side, target_amount, target_price) {
                    Ok(replaced) => {
                        let _ = crate::audit::order_replaced(audit, &symbol, &order.price.to_string(), &target_price.to_string());
                        if registry.should_notify_placement(asset) {
                            notifier.notify(&format!(
                                "new limit order: {side} {symbol} @ {target_price} amount {target_amount}"
                            ));
                        }
                        order = replaced;
                        thread::sleep(POLL_INTERVAL);
                    }
                    Err(e) => {
                        notifier.notify(&format!("failed to replace order for {symbol}: {e}"));
                        let _ = crate::audit::worker_error(audit, &symbol, &e.to_string());
                        count_error_or_give_up!(e.to_string());
                        if gave_up {
                            break;
                        }
                        match handle_order_completion(portfolio, &symbol, asset, side, target_price) {
                            Some((new_order, new_remaining)) => {
                                order = new_order;
                                remaining = new_remaining;
                                thread::sleep(ERROR_BACKOFF);
                            }
                            None => {
                                fully_filled = true;
                                break;
                            }
                        }
                    }
                },
                Err(rebalancer_exchange::AdapterError::OrderNotFound(_)) => {
                    cancel_open_orders(portfolio, asset, side);
                    match handle_order_completion(portfolio, &symbol, asset, side, target_price) {
                        Some((new_order, new_remaining)) => {
                            order = new_order;
                            remaining = new_remaining;
                            thread::sleep(ERROR_BACKOFF);
                        }
                        None => {
                            fully_filled = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("{symbol}: failed to cancel order {}: {e}", order.id);
                    count_error_or_give_up!(e.to_string());
                    if gave_up {
                        break;
                    }
                    cancel_open_orders(portfolio, asset, side);
                    match handle_order_completion(portfolio, &symbol, asset, side, target_price) {
                        Some((new_order, new_remaining)) => {
                            order = new_order;
                            remaining = new_remaining;
                            thread::sleep(ERROR_BACKOFF);
                        }
                        None => {
                            fully_filled = true;
                            break;
                        }
                    }
                }
            }
        } else {
            let _ = crate::audit::order_reconciling(audit, &symbol, &order.id);
            match adapter.fetch_order(&order.id, &symbol) {
                Ok(refreshed) if refreshed.status == OrderStatus::Closed => {
                    match handle_order_completion(portfolio, &symbol, asset, side, target_price) {
                        Some((new_order, new_remaining)) => {
                            order = new_order;
                            remaining = new_remaining;
                            thread::sleep(POLL_INTERVAL);
                        }
                        None => {
                            fully_filled = true;
                            break;
                        }
                    }
                }
                Ok(refreshed) => {
                    order = refreshed;
                    thread::sleep(STATUS_POLL_INTERVAL);
                }
                Err(rebalancer_exchange::AdapterError::OrderNotFound(_)) => {
                    match handle_order_completion(portfolio, &symbol, asset, side, target_price) {
                        Some((new_order, new_remaining)) => {
                            order = new_order;
                            remaining = new_remaining;
                            thread::sleep(POLL_INTERVAL);
                        }
                        None => {
                            fully_filled = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("{symbol}: failed to refresh order {}: {e}", order.id);
                    count_error_or_give_up!(e.to_string());
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
    }

    if fully_filled {
        let unit = if matches!(side, Side::Buy) { portfolio.base_asset() } else { asset };
        let message = format!("order fully matched, {side} {symbol} => {amount} {unit}");
        info!("{message}");
        notifier.notify(&message);
        let _ = crate::audit::fully_matched(audit, &symbol, &side.to_string(), &amount.to_string());
    } else if !gave_up {
        let _ = crate::audit::worker_stopped(audit, &symbol);
    }
}

/// After a replace or fetch fails to find the order (it filled or was
/// cancelled externally), check the remaining tradeable balance: zero
/// means fully matched, otherwise place a fresh order for what's left.
fn handle_order_completion(
    portfolio: &Portfolio,
    symbol: &str,
    asset: &str,
    side: Side,
    target_price: Decimal,
) -> Option<(Order, Decimal)> {
    let remaining = remaining_amount(portfolio, asset, side, target_price)?;
    if remaining <= Decimal::ZERO {
        return None;
    }
    match portfolio.adapter().create_order(symbol, side, remaining, target_price) {
        Ok(order) => Some((order, remaining)),
        Err(_) => None,
    }
}

fn remaining_amount(portfolio: &Portfolio, asset: &str, side: Side, target_price: Decimal) -> Option<Decimal> {
    match side {
        Side::Buy => {
            let base_balance = portfolio.available_base_balance_for_asset(asset).ok()? * (Decimal::ONE - portfolio.fee());
            let remaining = if target_price.is_zero() { Decimal::ZERO } else { base_balance / target_price };
            let (min_amount, min_cost) = portfolio.min_trade_amount(asset).ok()?;
            if (!min_amount.is_zero() && remaining < min_amount) || (!min_cost.is_zero() && base_balance < min_cost) {
                return Some(Decimal::ZERO);
            }
            Some(remaining)
        }
        Side::Sell => {
            let quote_balance = portfolio.adapter().fetch_balance().ok()?.get(asset).map(|b| b.free).unwrap_or(Decimal::ZERO);
            let (min_amount, min_cost) = portfolio.min_trade_amount(asset).ok()?;
            if (!min_amount.is_zero() && quote_balance < min_amount)
                || (!min_cost.is_zero() && quote_balance * target_price < min_cost)
            {
                return Some(Decimal::ZERO);
            }
            Some(quote_balance)
        }
    }
}

/// Best-effort cancellation of every open order for `symbol`, run before
/// a new worker starts — BITKUB alone needs `side` threaded through the
/// cancel call as `{"sd": side}`; every other exchange ignores it.
pub fn cancel_open_orders(portfolio: &Portfolio, asset: &str, side: Side) {
    let symbol = portfolio.symbol_for(asset);
    let adapter = portfolio.adapter();
    if !adapter.capabilities().has_fetch_open_orders {
        return;
    }
    let orders = match adapter.fetch_open_orders(&symbol) {
        Ok(o) => o,
        Err(e) => {
            warn!("{symbol}: failed to fetch open orders: {e}");
            return;
        }
    };
    for order in orders {
        if let Err(e) = adapter.cancel_order(&order.id, &symbol, side) {
            warn!("{symbol}: unable to cancel order {}: {e}", order.id);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalancer_core::config::ExchangeConfig;
    use rebalancer_core::types::{Balance, Market};
    use rebalancer_exchange::mock::{FillMode, MockExchange};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            base_asset: "USDT".to_string(),
            universe: vec!["BTC".to_string()],
            fee: dec("0.001"),
        }
    }

    fn portfolio_with_filled_book() -> (Arc<Portfolio>, Arc<MockExchange>) {
        let mock = Arc::new(MockExchange::new("mock").with_fill_mode(FillMode::ImmediateFull));
        mock.set_market(Market {
            symbol: "BTC/USDT".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            price_precision: dec("0.01"),
            amount_precision: 8,
            min_amount: dec("0.0001"),
            min_cost: dec("10"),
        });
        mock.set_order_book("BTC/USDT", vec![(dec("100"), dec("1"))], vec![(dec("101"), dec("1"))]);
        mock.set_balance("USDT", Balance { free: dec("1000"), used: Decimal::ZERO });
        let portfolio = Arc::new(Portfolio::new("mock", mock.clone(), &config()).unwrap());
        (portfolio, mock)
    }

    #[test]
    fn worker_registry_stop_existing_is_a_noop_when_nothing_running() {
        let registry = WorkerRegistry::new();
        registry.stop_existing("BTC", &crate::notify::NoopNotifier); // must not panic or block
        assert!(!registry.is_running("BTC"));
    }

    #[test]
    fn placement_notification_is_rate_limited_per_asset() {
        let registry = WorkerRegistry::new();
        assert!(registry.should_notify_placement("BTC"), "first notification always goes out");
        assert!(!registry.should_notify_placement("BTC"), "a second call inside the window is suppressed");
        assert!(
            registry.should_notify_placement("ETH"),
            "a different asset's window is tracked independently"
        );
    }

    #[test]
    fn worker_gives_up_and_deregisters_after_exhausting_error_budget() {
        // A resting fill (not ImmediateFull) so the worker actually
        // reaches the replace loop instead of closing on its first
        // refresh.
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
        mock.set_order_book("BTC/USDT", vec![(dec("100"), dec("1"))], vec![(dec("101"), dec("1"))]);
        mock.set_balance("USDT", Balance { free: dec("1000"), used: Decimal::ZERO });
        let portfolio = Arc::new(Portfolio::new("mock", mock.clone(), &config()).unwrap());

        let registry = Arc::new(WorkerRegistry::new());
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::open(&dir.path().join("audit.jsonl")).unwrap());
        let notifier: Arc<dyn Notifier> = Arc::new(crate::notify::NoopNotifier);

        spawn_worker(
            registry.clone(),
            portfolio,
            audit,
            notifier,
            "BTC".to_string(),
            Side::Buy,
            dec("100"),
            LimitOrderStrategy::BestBidOrAsk,
            vec![dec("4"), dec("2"), dec("1"), dec("1"), dec("0"), dec("0")],
        );

        // Give the worker time to place its initial order before yanking
        // the book out from under it.
        thread::sleep(Duration::from_millis(100));
        mock.clear_order_book("BTC/USDT");

        for _ in 0..150 {
            if !registry.is_running("BTC") {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        assert!(!registry.is_running("BTC"), "worker must give up once its error budget is exhausted");
    }

    #[test]
    fn immediate_fill_worker_reaches_fully_matched_and_deregisters() {
        let (portfolio, _mock) = portfolio_with_filled_book();
        let registry = Arc::new(WorkerRegistry::new());
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::open(&dir.path().join("audit.jsonl")).unwrap());
        let notifier: Arc<dyn Notifier> = Arc::new(crate::notify::NoopNotifier);

        spawn_worker(
            registry.clone(),
            portfolio,
            audit,
            notifier,
            "BTC".to_string(),
            Side::Buy,
            dec("100"),
            LimitOrderStrategy::BestBidOrAsk,
            vec![dec("4"), dec("2"), dec("1"), dec("1"), dec("0"), dec("0")],
        );

        // ImmediateFull means the worker's first fetch_order already
        // reports closed — give the thread a moment to run to completion.
        for _ in 0..50 {
            if !registry.is_running("BTC") {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!registry.is_running("BTC"));
    }
}

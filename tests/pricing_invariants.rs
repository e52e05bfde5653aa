//! Property-based tests for the pricing math.
//!
//! These use proptest to verify invariants that must hold across randomly
//! generated order books and budgets, not just the fixed sample book
//! exercised by the unit tests in `src/pricing.rs`.

use proptest::prelude::*;
use rebalancer_core::pricing::{
    calculate_initial_buy_price, calculate_limit_buy_price, calculate_limit_sell_price,
    precision_to_tick_size, quantize,
};
use rebalancer_core::types::{Level, LimitOrderStrategy};
use rust_decimal::Decimal;

/// A price in cents, reinterpreted as a two-decimal `Decimal`.
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// A quantity with five decimal places, the precision Binance-style
/// markets commonly use for base-asset amounts.
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000i64).prop_map(|units| Decimal::new(units, 5))
}

/// A descending (bid-style) book of 1-10 levels built from a top price
/// and a fixed tick, each level one tick below the previous.
fn descending_book_strategy(tick: Decimal) -> impl Strategy<Value = Vec<Level>> {
    (price_strategy(), quantity_strategy(), 1usize..=10).prop_map(move |(top, qty, depth)| {
        (0..depth)
            .map(|i| (top - tick * Decimal::from(i as i64), qty))
            .collect::<Vec<Level>>()
    })
}

/// An ascending (ask-style) book, mirroring `descending_book_strategy`.
fn ascending_book_strategy(tick: Decimal) -> impl Strategy<Value = Vec<Level>> {
    (price_strategy(), quantity_strategy(), 1usize..=10).prop_map(move |(top, qty, depth)| {
        (0..depth)
            .map(|i| (top + tick * Decimal::from(i as i64), qty))
            .collect::<Vec<Level>>()
    })
}

fn default_weights() -> Vec<Decimal> {
    vec![
        Decimal::new(4, 0),
        Decimal::new(2, 0),
        Decimal::new(1, 0),
        Decimal::new(1, 0),
        Decimal::ZERO,
        Decimal::ZERO,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// `BEST_BID_OR_ASK` always returns the literal top-of-book price,
    /// regardless of how deep or thin the rest of the book is.
    #[test]
    fn best_bid_or_ask_returns_top_of_book(
        book in descending_book_strategy(Decimal::new(1, 2)),
    ) {
        let tick = Decimal::new(1, 2);
        let weights = default_weights();
        let price = calculate_limit_buy_price(&book, LimitOrderStrategy::BestBidOrAsk, tick, &weights, None);
        prop_assert_eq!(price, book[0].0);
    }

    #[test]
    fn best_bid_or_ask_sell_returns_top_of_book(
        book in ascending_book_strategy(Decimal::new(1, 2)),
    ) {
        let tick = Decimal::new(1, 2);
        let weights = default_weights();
        let price = calculate_limit_sell_price(&book, LimitOrderStrategy::BestBidOrAsk, tick, &weights, None);
        prop_assert_eq!(price, book[0].0);
    }

    /// Whatever price the weighted-average strategy lands on, it is an
    /// exact multiple of the tick size — no binary-float drift, no
    /// in-between prices an exchange would reject.
    #[test]
    fn weighted_average_price_is_always_on_tick(
        book in descending_book_strategy(Decimal::new(1, 2)),
    ) {
        let tick = Decimal::new(1, 2);
        let weights = default_weights();
        let price = calculate_limit_buy_price(&book, LimitOrderStrategy::WeightedAverage, tick, &weights, None);
        prop_assert_eq!(price % tick, Decimal::ZERO);
    }

    /// `quantize` never returns a price off the tick grid.
    #[test]
    fn quantize_is_always_on_tick(price in price_strategy()) {
        let tick = Decimal::new(1, 2);
        prop_assert_eq!(quantize(price, tick) % tick, Decimal::ZERO);
    }

    /// Re-quantizing an already-quantized price is a no-op.
    #[test]
    fn quantize_is_idempotent(price in price_strategy()) {
        let tick = Decimal::new(1, 2);
        let once = quantize(price, tick);
        let twice = quantize(once, tick);
        prop_assert_eq!(once, twice);
    }

    /// `precision_to_tick_size` treats any integer precision as "number
    /// of decimal places", regardless of how large.
    #[test]
    fn precision_to_tick_size_is_power_of_ten(places in 0u32..=8) {
        let tick = precision_to_tick_size(Decimal::from(places));
        prop_assert_eq!(tick, Decimal::new(1, places));
    }

    /// An initial buy placement never drifts from the requested budget by
    /// more than the rounding error of one decimal division: `amount *
    /// price` recovers `base_amount` to within a tiny epsilon.
    #[test]
    fn initial_buy_amount_recovers_budget(
        book in descending_book_strategy(Decimal::new(1, 2)),
        base_amount in (100i64..=1_000_000_00i64).prop_map(|c| Decimal::new(c, 2)),
    ) {
        let tick = Decimal::new(1, 2);
        let weights = default_weights();
        let (price, amount) = calculate_initial_buy_price(&book, base_amount, tick, LimitOrderStrategy::WeightedAverage, &weights);
        if !price.is_zero() {
            let spent = amount * price;
            let epsilon = Decimal::new(1, 10);
            prop_assert!((spent - base_amount).abs() <= epsilon);
        }
    }
}

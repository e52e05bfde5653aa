//! Pure, deterministic functions mapping an order book plus a strategy to
//! a target limit price. No I/O, no mutable state — every function here
//! takes its inputs by reference and returns a fresh [`Decimal`].

use rust_decimal::prelude::*;

use crate::types::{Level, LimitOrderStrategy, Order, Side};

/// Tick size from a market's raw precision value: the value itself when
/// it already is the tick (sub-1), otherwise `10^-precision`.
pub fn precision_to_tick_size(precision: Decimal) -> Decimal {
    if precision < Decimal::ONE {
        precision
    } else {
        let places = precision.round().mantissa() as u32;
        Decimal::new(1, places)
    }
}

/// In-flight order context passed to the pricing functions so they can
/// discount the engine's own resting quantity from the book.
#[derive(Clone, Copy, Debug)]
pub struct CurrentOrderRef {
    pub price: Decimal,
    pub remaining: Decimal,
}

impl CurrentOrderRef {
    pub fn new(price: Decimal, remaining: Decimal) -> Self {
        Self { price, remaining }
    }

    pub fn from_order(order: &Order) -> Self {
        Self::new(order.price, order.remaining)
    }
}

/// `BEST_BID_OR_ASK`: the literal top of book on the relevant side.
fn best_bid_or_ask(levels: &[Level]) -> Decimal {
    levels.first().map(|(p, _)| *p).unwrap_or(Decimal::ZERO)
}

/// `BETTER_THAN_BEST_PRICE`: one tick inside the spread, unless our own
/// resting order is already at the top (avoids a redundant replace).
fn better_than_best_price(
    levels: &[Level],
    tick_size: Decimal,
    is_buy: bool,
    current_order: Option<CurrentOrderRef>,
) -> Decimal {
    let top = best_bid_or_ask(levels);
    if let Some(cur) = current_order {
        if cur.price == top {
            return top;
        }
    }
    if is_buy {
        top + tick_size
    } else {
        top - tick_size
    }
}

/// `WEIGHTED_AVERAGE`: weighted average across the top N levels (N =
/// `weights.len() - 1`), with a synthetic "best" level folded in at
/// `weights[0]`, then rounded away from the market to the nearest tick.
///
/// Mirrors the reference algorithm level-for-level: `wi` (the weight
/// index) only advances for levels that are not skipped, while `i` (the
/// loop counter) walks the raw level list — a level whose residual
/// quantity (after subtracting our own resting order) is below 1% of
/// that order's remaining amount is treated as empty and skipped without
/// consuming a weight slot.
pub fn weighted_average_price(
    levels: &[Level],
    weights: &[Decimal],
    tick_size: Decimal,
    is_buy: bool,
    current_order: Option<CurrentOrderRef>,
) -> Decimal {
    assert!(weights.len() >= 2, "need at least a best weight and one depth weight");

    let mut weighted_price_sum = Decimal::ZERO;
    let mut weighted_quantity_sum = Decimal::ZERO;
    let mut wi: usize = 0;
    let mut first_level: Option<usize> = None;

    let scan_len = (weights.len() - 1).min(levels.len());
    for (i, &(price, raw_quantity)) in levels.iter().take(scan_len).enumerate() {
        let mut quantity = raw_quantity;
        if let Some(cur) = current_order {
            if price == cur.price {
                quantity -= cur.remaining;
                if quantity < cur.remaining * Decimal::new(1, 2) {
                    continue;
                }
            }
        }
        if first_level.is_none() {
            first_level = Some(i);
        }
        let w = weights[wi + 1];
        weighted_price_sum += price * quantity * w;
        weighted_quantity_sum += quantity * w;
        wi += 1;
    }

    let first_level = first_level.unwrap_or(0);
    let first_price = levels.get(first_level).map(|(p, _)| *p).unwrap_or(Decimal::ZERO);
    let synthetic_best_price = if is_buy {
        first_price + tick_size
    } else {
        first_price - tick_size
    };

    let depth_weight_sum: Decimal = weights[1..].iter().copied().sum();
    let synthetic_best_quantity = if depth_weight_sum.is_zero() {
        Decimal::ZERO
    } else {
        weighted_quantity_sum / depth_weight_sum
    };

    weighted_price_sum += synthetic_best_price * synthetic_best_quantity * weights[0];
    weighted_quantity_sum += synthetic_best_quantity * weights[0];

    let raw_average = if weighted_quantity_sum.is_zero() {
        synthetic_best_price
    } else {
        weighted_price_sum / weighted_quantity_sum
    };

    round_to_tick(raw_average, tick_size, is_buy)
}

/// Round a raw price to the nearest tick, away from the market: ceil for
/// buy (never pay less than we computed), floor for sell.
fn round_to_tick(price: Decimal, tick_size: Decimal, is_buy: bool) -> Decimal {
    if tick_size.is_zero() {
        return price;
    }
    let ticks = (price / tick_size).floor();
    if is_buy {
        (ticks + Decimal::ONE) * tick_size
    } else {
        ticks * tick_size
    }
}

/// Profitability adjustment: pull the candidate price inside the spread
/// by one tick if a deep-enough level already sits strictly better than
/// it. Returns the unadjusted `price` when no such level is found.
pub fn adjust_price_for_profit(
    price: Decimal,
    order_book_side: &[Level],
    tick_size: Decimal,
    is_buy: bool,
    current_order: Option<CurrentOrderRef>,
    quantity_threshold: Decimal,
) -> Decimal {
    let mut adjusted = Decimal::ZERO;

    for &(ob_price, raw_quantity) in order_book_side {
        let mut ob_quantity = raw_quantity;
        if let Some(cur) = current_order {
            if ob_price == cur.price {
                ob_quantity -= cur.remaining;
            }
        }
        if current_order.is_some() && ob_quantity <= quantity_threshold {
            continue;
        }
        if is_buy {
            if ob_price < price && ob_quantity >= quantity_threshold {
                adjusted = ob_price + tick_size;
                break;
            }
        } else if ob_price > price && ob_quantity >= quantity_threshold {
            adjusted = ob_price - tick_size;
            break;
        }
    }

    quantize(adjusted, tick_size)
}

/// Snap a price to an exact multiple of `tick_size`, using decimal
/// division rather than floating point.
pub fn quantize(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size.is_zero() {
        return price;
    }
    (price / tick_size).round() * tick_size
}

fn limit_price(
    side: Side,
    levels: &[Level],
    strategy: LimitOrderStrategy,
    tick_size: Decimal,
    weights: &[Decimal],
    current_order: Option<CurrentOrderRef>,
) -> Decimal {
    let is_buy = matches!(side, Side::Buy);
    match strategy {
        LimitOrderStrategy::BestBidOrAsk => best_bid_or_ask(levels),
        LimitOrderStrategy::BetterThanBestPrice => {
            better_than_best_price(levels, tick_size, is_buy, current_order)
        }
        LimitOrderStrategy::WeightedAverage => {
            weighted_average_price(levels, weights, tick_size, is_buy, current_order)
        }
    }
}

/// `CalculateLimitBuyPrice` from the operation table: dispatches on
/// strategy over the bid side.
pub fn calculate_limit_buy_price(
    bids: &[Level],
    strategy: LimitOrderStrategy,
    tick_size: Decimal,
    weights: &[Decimal],
    current_order: Option<CurrentOrderRef>,
) -> Decimal {
    limit_price(Side::Buy, bids, strategy, tick_size, weights, current_order)
}

/// `CalculateLimitSellPrice` from the operation table: dispatches on
/// strategy over the ask side.
pub fn calculate_limit_sell_price(
    asks: &[Level],
    strategy: LimitOrderStrategy,
    tick_size: Decimal,
    weights: &[Decimal],
    current_order: Option<CurrentOrderRef>,
) -> Decimal {
    limit_price(Side::Sell, asks, strategy, tick_size, weights, current_order)
}

/// Initial buy placement: price from the strategy, converted to an
/// amount at that price, then re-adjusted for profitability using the
/// amount itself as the depth threshold.
pub fn calculate_initial_buy_price(
    bids: &[Level],
    base_amount: Decimal,
    tick_size: Decimal,
    strategy: LimitOrderStrategy,
    weights: &[Decimal],
) -> (Decimal, Decimal) {
    let mut price = calculate_limit_buy_price(bids, strategy, tick_size, weights, None);
    let mut amount = if price.is_zero() { Decimal::ZERO } else { base_amount / price };
    price = adjust_price_for_profit(
        price,
        bids,
        tick_size,
        true,
        None,
        amount * Decimal::new(1, 2),
    );
    if !price.is_zero() {
        amount = base_amount / price;
    }
    (price, amount)
}

/// Initial sell placement: price from the strategy over the ask side,
/// adjusted for profitability using 1% of the quote amount as depth
/// threshold. Amount is simply the quote amount (unchanged by price).
pub fn calculate_initial_sell_price(
    asks: &[Level],
    quote_amount: Decimal,
    tick_size: Decimal,
    strategy: LimitOrderStrategy,
    weights: &[Decimal],
) -> Decimal {
    let price = calculate_limit_sell_price(asks, strategy, tick_size, weights, None);
    adjust_price_for_profit(
        price,
        asks,
        tick_size,
        false,
        None,
        quote_amount * Decimal::new(1, 2),
    )
}

/// Target price for an already-resting order: strategy price over the
/// relevant side (discounting our own resting quantity), profitability
/// adjusted using 1% of `remaining` as depth threshold.
pub fn calculate_target_price(
    book_side: &[Level],
    remaining: Decimal,
    side: Side,
    tick_size: Decimal,
    strategy: LimitOrderStrategy,
    weights: &[Decimal],
    current_order: CurrentOrderRef,
) -> Decimal {
    let is_buy = matches!(side, Side::Buy);
    let mut price = limit_price(side, book_side, strategy, tick_size, weights, Some(current_order));
    price = adjust_price_for_profit(
        price,
        book_side,
        tick_size,
        is_buy,
        Some(current_order),
        remaining * Decimal::new(1, 2),
    );
    price
}

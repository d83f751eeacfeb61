//! Monetary amount helpers.

use crate::document::LineItem;
use rand::{Rng, RngCore};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Lowest generated unit price.
pub const MIN_PRICE: f64 = 5.0;
/// Highest generated unit price.
pub const MAX_PRICE: f64 = 500.0;

/// Round to cents, halves away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Generate a unit price in `[MIN_PRICE, MAX_PRICE]` rounded to cents.
pub fn random_price(rng: &mut dyn RngCore) -> Decimal {
    let raw = rng.random_range(MIN_PRICE..=MAX_PRICE);
    Decimal::from_f64(raw)
        .map(round_cents)
        .unwrap_or_else(|| Decimal::new(500, 2))
}

/// Sum of `qty * price` over the items, rounded to cents.
pub fn order_total(items: &[LineItem]) -> Decimal {
    let sum: Decimal = items
        .iter()
        .map(|item| Decimal::from(item.qty) * item.price)
        .sum();
    round_cents(sum)
}

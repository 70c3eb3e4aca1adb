//! Order price computation
//!
//! All arithmetic uses `Decimal`; values are converted to `f64` only at the
//! model boundary. The total is summed from the already-rounded `f64` parts,
//! so `total == items + shipping + tax` holds on the exposed fields. Shared by the COD checkout, the payment-intent request and
//! the online verification path so the three always agree.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Items total strictly above this ships free
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
/// Flat shipping fee below the threshold
pub const FLAT_SHIPPING_FEE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
/// 18% tax on the items total
pub const TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

const MONEY_PLACES: u32 = 2;

/// 订单价格明细
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items_price: f64,
    pub shipping_price: f64,
    pub tax_price: f64,
    pub total_price: f64,
}

impl PriceBreakdown {
    /// Total in minor currency units (paise), as the gateway expects
    pub fn total_minor_units(&self) -> i64 {
        (to_decimal(self.total_price) * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or_default()
    }
}

#[inline]
fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[inline]
fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(MONEY_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Compute items, shipping, tax and total for `(unit_price, quantity)` lines.
///
/// - shipping is 0 when items > 1000 or the cart is empty, otherwise 50
/// - tax is `items × 0.18` rounded to a whole unit, half away from zero
pub fn compute_prices<I>(lines: I) -> PriceBreakdown
where
    I: IntoIterator<Item = (f64, i32)>,
{
    let items: Decimal = lines
        .into_iter()
        .map(|(price, qty)| to_decimal(price) * Decimal::from(qty))
        .sum();

    let shipping = if items.is_zero() || items > FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_FEE
    };

    let tax = (items * TAX_RATE).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let items_price = to_f64(items);
    let shipping_price = to_f64(shipping);
    let tax_price = to_f64(tax);
    PriceBreakdown {
        items_price,
        shipping_price,
        tax_price,
        total_price: items_price + shipping_price + tax_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_shipping_above_threshold() {
        let p = compute_prices([(500.0, 3)]);
        assert_eq!(p.items_price, 1500.0);
        assert_eq!(p.shipping_price, 0.0);
        assert_eq!(p.tax_price, 270.0);
        assert_eq!(p.total_price, 1770.0);
    }

    #[test]
    fn test_flat_shipping_below_threshold() {
        let p = compute_prices([(100.0, 2)]);
        assert_eq!(p.items_price, 200.0);
        assert_eq!(p.shipping_price, 50.0);
        assert_eq!(p.tax_price, 36.0);
        assert_eq!(p.total_price, 286.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let p = compute_prices([(1000.0, 1)]);
        assert_eq!(p.shipping_price, 50.0);
        assert_eq!(p.tax_price, 180.0);
        assert_eq!(p.total_price, 1230.0);

        let p = compute_prices([(1000.01, 1)]);
        assert_eq!(p.shipping_price, 0.0);
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let p = compute_prices(Vec::<(f64, i32)>::new());
        assert_eq!(p.items_price, 0.0);
        assert_eq!(p.shipping_price, 0.0);
        assert_eq!(p.total_price, 0.0);
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 2.5 × 0.18 = 0.45 -> 0
        assert_eq!(compute_prices([(2.5, 1)]).tax_price, 0.0);
        // 25 × 0.18 = 4.5 -> 5
        assert_eq!(compute_prices([(25.0, 1)]).tax_price, 5.0);
        // 99.99 × 0.18 = 17.9982 -> 18
        assert_eq!(compute_prices([(99.99, 1)]).tax_price, 18.0);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let p = compute_prices([(19.99, 3), (249.5, 2), (0.1, 7)]);
        assert_eq!(p.items_price, 559.67);
        assert_eq!(p.total_price, p.items_price + p.shipping_price + p.tax_price);

        // 每个分值价格 0.01 ..= 2000.00
        for cents in 1..=200_000i64 {
            let price = cents as f64 / 100.0;
            let p = compute_prices([(price, 1)]);
            assert_eq!(
                p.total_price,
                p.items_price + p.shipping_price + p.tax_price,
                "price {price}"
            );
            let expected = cents + (p.shipping_price as i64 + p.tax_price as i64) * 100;
            assert_eq!(p.total_minor_units(), expected, "price {price}");
        }
    }

    #[test]
    fn test_total_minor_units() {
        let p = compute_prices([(100.0, 2)]);
        assert_eq!(p.total_minor_units(), 28600);

        let p = compute_prices([(19.99, 1)]);
        // 19.99 + 50 + 4 = 73.99
        assert_eq!(p.total_minor_units(), 7399);
    }
}

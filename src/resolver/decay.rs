//! Linear Dutch-auction price decay

use crate::error::DecayError;
use crate::model::numeric::{mul_div, parse_u256};
use crate::model::{Auction, DecayCurve};

use alloy_primitives::U256;
use chrono::Utc;
use tracing::warn;

/// Where a quoted price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Decayed,
    /// The curve could not be evaluated; the start price is reported instead
    FallbackStartPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: U256,
    pub source: PriceSource,
}

/// Current unix time in seconds
pub fn unix_now() -> u128 {
    Utc::now().timestamp().max(0) as u128
}

/// Price of `curve` at `now` (seconds).
///
/// Flat at `start_price` up to `start_ts`, flat at `end_price` from `end_ts`,
/// and linear in between with the reduction truncated toward zero. The
/// result therefore never leaves `[end_price, start_price]`.
pub fn price_at(curve: &DecayCurve, now: u128) -> Result<U256, DecayError> {
    if now <= curve.start_ts {
        return Ok(curve.start_price);
    }
    if now >= curve.end_ts {
        return Ok(curve.end_price);
    }
    if curve.start_price < curve.end_price {
        return Err(DecayError::InvertedPrices {
            start: curve.start_price.to_string(),
            end: curve.end_price.to_string(),
        });
    }

    let spread = curve.start_price - curve.end_price;
    let elapsed = U256::from(now - curve.start_ts);
    let duration = U256::from(curve.duration());
    // elapsed < duration here, so the quotient is always below `spread`
    let reduction = mul_div(spread, elapsed, duration).unwrap_or(spread);

    Ok(curve.start_price - reduction)
}

/// Quote an auction at `now`, falling back to its start price when the
/// curve fields are unusable. Fails only if the start price itself is.
pub fn quote(auction: &Auction, now: u128) -> Result<PriceQuote, DecayError> {
    let decayed = DecayCurve::from_auction(auction).and_then(|curve| price_at(&curve, now));

    match decayed {
        Ok(price) => Ok(PriceQuote {
            price,
            source: PriceSource::Decayed,
        }),
        Err(e) => {
            warn!(
                "Failed to compute decay price for auction {}: {}",
                auction.order_id, e
            );
            crate::metrics::record_decay_fallback();

            let price = parse_u256("startPrice", &auction.start_price)?;
            Ok(PriceQuote {
                price,
                source: PriceSource::FallbackStartPrice,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::numeric::pack_start_end_ts;
    use crate::model::{AuctionStatus, BroadcastRequest};

    const T: u128 = 1_700_000_000;

    fn scenario_curve() -> DecayCurve {
        // 0.1 -> 0.05 over 120 seconds
        DecayCurve::new(
            U256::from(100_000_000_000_000_000u64),
            U256::from(50_000_000_000_000_000u64),
            T,
            T + 120,
        )
    }

    fn auction(start_price: &str, end_price: &str, start_end_ts: &str) -> Auction {
        BroadcastRequest {
            order_id: "A1".into(),
            start_price: start_price.into(),
            end_price: end_price.into(),
            start_end_ts: start_end_ts.into(),
            ..Default::default()
        }
        .into_auction("A1".into(), 0)
    }

    #[test]
    fn test_midpoint_and_end() {
        let curve = scenario_curve();
        assert_eq!(
            price_at(&curve, T + 60).unwrap(),
            U256::from(75_000_000_000_000_000u64)
        );
        assert_eq!(
            price_at(&curve, T + 120).unwrap(),
            U256::from(50_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_boundaries() {
        let curve = scenario_curve();
        assert_eq!(price_at(&curve, T).unwrap(), curve.start_price);
        assert_eq!(price_at(&curve, T - 1).unwrap(), curve.start_price);
        assert_eq!(price_at(&curve, 0).unwrap(), curve.start_price);
        assert_eq!(price_at(&curve, T + 121).unwrap(), curve.end_price);
        assert_eq!(price_at(&curve, u128::MAX).unwrap(), curve.end_price);
    }

    #[test]
    fn test_monotone_and_bounded() {
        let curve = DecayCurve::new(U256::from(1_000_003u64), U256::from(7u64), T, T + 97);
        let mut previous = curve.start_price;
        for now in T..=T + 97 {
            let price = price_at(&curve, now).unwrap();
            assert!(price <= previous, "price rose at {}", now);
            assert!(price >= curve.end_price && price <= curve.start_price);
            previous = price;
        }
    }

    #[test]
    fn test_reduction_truncates() {
        // reduction = 10 * 1 / 3 = 3 (not 3.33)
        let curve = DecayCurve::new(U256::from(20u64), U256::from(10u64), 0, 3);
        assert_eq!(price_at(&curve, 1).unwrap(), U256::from(17u64));
        assert_eq!(price_at(&curve, 2).unwrap(), U256::from(14u64));
    }

    #[test]
    fn test_flat_curve() {
        let curve = DecayCurve::new(U256::from(5u64), U256::from(5u64), T, T + 10);
        assert_eq!(price_at(&curve, T + 5).unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_inverted_prices_error_inside_window() {
        let curve = DecayCurve::new(U256::from(1u64), U256::from(2u64), T, T + 10);
        assert!(matches!(
            price_at(&curve, T + 5),
            Err(DecayError::InvertedPrices { .. })
        ));
    }

    #[test]
    fn test_full_width_prices_decay_exactly() {
        let half = U256::from(1u64) << 255;
        let curve = DecayCurve::new(half, U256::ZERO, T, T + 120);
        assert_eq!(price_at(&curve, T + 60).unwrap(), U256::from(1u64) << 254);

        // (2^256 - 1) / (2^128 - 1) = 2^128 + 1 exactly
        let curve = DecayCurve::new(U256::MAX, U256::ZERO, 0, u128::MAX);
        assert_eq!(
            price_at(&curve, u128::MAX - 1).unwrap(),
            (U256::from(1u64) << 128) + U256::from(1u64)
        );
    }

    #[test]
    fn test_quote_full_width_auction_is_decayed() {
        let half: U256 = U256::from(1u64) << 255;
        let a = auction(
            &half.to_string(),
            "0",
            &pack_start_end_ts(T, T + 120).to_string(),
        );
        let q = quote(&a, T + 60).unwrap();
        assert_eq!(q.source, PriceSource::Decayed);
        assert_eq!(q.price, U256::from(1u64) << 254);
    }

    #[test]
    fn test_quote_decays_well_formed_auction() {
        let a = auction(
            "100000000000000000",
            "50000000000000000",
            &pack_start_end_ts(T, T + 120).to_string(),
        );
        assert_eq!(a.status, AuctionStatus::Active);
        let q = quote(&a, T + 60).unwrap();
        assert_eq!(q.source, PriceSource::Decayed);
        assert_eq!(q.price, U256::from(75_000_000_000_000_000u64));
    }

    #[test]
    fn test_quote_falls_back_to_start_price() {
        let a = auction("100000000000000000", "50000000000000000", "not-packed");
        let q = quote(&a, T + 60).unwrap();
        assert_eq!(q.source, PriceSource::FallbackStartPrice);
        assert_eq!(q.price, U256::from(100_000_000_000_000_000u64));

        let broken = auction("garbage", "1", "not-packed");
        assert!(quote(&broken, T).is_err());
    }
}

//! Decay curve parameters extracted from an auction

use super::numeric::{parse_u256, unpack_start_end_ts};
use super::Auction;
use crate::error::DecayError;

use alloy_primitives::U256;

/// Linear price decay from `start_price` at `start_ts` to `end_price` at `end_ts`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayCurve {
    pub start_price: U256,
    pub end_price: U256,
    /// Seconds since epoch
    pub start_ts: u128,
    /// Seconds since epoch
    pub end_ts: u128,
}

impl DecayCurve {
    pub fn new(start_price: U256, end_price: U256, start_ts: u128, end_ts: u128) -> Self {
        Self {
            start_price,
            end_price,
            start_ts,
            end_ts,
        }
    }

    /// Parse the curve from an auction's string fields
    pub fn from_auction(auction: &Auction) -> Result<Self, DecayError> {
        let start_price = parse_u256("startPrice", &auction.start_price)?;
        let end_price = parse_u256("endPrice", &auction.end_price)?;
        let packed = parse_u256("startEndTs", &auction.start_end_ts)?;
        let (start_ts, end_ts) = unpack_start_end_ts(packed);

        Ok(Self::new(start_price, end_price, start_ts, end_ts))
    }

    pub fn duration(&self) -> u128 {
        self.end_ts.saturating_sub(self.start_ts)
    }
}

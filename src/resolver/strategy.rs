//! Bid-trigger policies

use crate::model::numeric::{mul_div, parse_u256};
use crate::model::Auction;

use alloy_primitives::U256;

/// Pure predicate deciding whether to bid on an auction at its current price
pub trait BidStrategy: Send + Sync {
    fn should_bid(&self, auction: &Auction, current_price: U256) -> bool;
}

/// Bid once the price has fallen to `percent` of the start price or below
#[derive(Debug, Clone, Copy)]
pub struct ThresholdStrategy {
    percent: u64,
}

impl ThresholdStrategy {
    pub fn new(percent: u64) -> Self {
        Self { percent }
    }

    /// `start_price * percent / 100`, floored; `None` only above 100%
    /// when the result exceeds 256 bits
    pub fn threshold(&self, start_price: U256) -> Option<U256> {
        mul_div(start_price, U256::from(self.percent), U256::from(100u64))
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self::new(80)
    }
}

impl BidStrategy for ThresholdStrategy {
    fn should_bid(&self, auction: &Auction, current_price: U256) -> bool {
        parse_u256("startPrice", &auction.start_price)
            .ok()
            .and_then(|start| self.threshold(start))
            .is_some_and(|threshold| current_price <= threshold)
    }
}

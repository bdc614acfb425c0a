//! Resolver side of the auction protocol
//!
//! The resolver:
//! 1. Waits for the registry to answer its health check (bounded retries)
//! 2. Polls the live auction list on a fixed interval
//! 3. Evaluates each order id exactly once: decayed price, then bid policy
//! 4. Emits a bid decision; settlement is left to subscribers

pub mod client;
pub mod decay;
pub mod engine;
pub mod strategy;

pub use client::{HttpRegistryClient, RegistryClient};
pub use engine::{next_decision, BidAction, BidDecision, ResolverEngine, ResolverState};
pub use strategy::{BidStrategy, ThresholdStrategy};

use crate::config::ResolverConfig;
use crate::error::CoordinatorResult;

use std::sync::Arc;

/// Engine wired to the HTTP registry with the threshold policy from config
pub fn build_engine(config: &ResolverConfig) -> CoordinatorResult<ResolverEngine> {
    let client = HttpRegistryClient::new(&config.server_url, config.request_timeout())?;
    let strategy = ThresholdStrategy::new(config.bid_threshold_percent);

    Ok(ResolverEngine::new(
        Arc::new(client),
        Box::new(strategy),
        config.clone(),
    ))
}

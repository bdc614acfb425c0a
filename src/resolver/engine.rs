//! Resolver engine: polls the registry and decides once per auction whether to bid

use super::client::RegistryClient;
use super::decay::{self, PriceSource};
use super::strategy::BidStrategy;
use crate::config::ResolverConfig;
use crate::error::{CoordinatorError, CoordinatorResult, NetworkErrorKind};
use crate::model::{Auction, HealthResponse};

use alloy_primitives::U256;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Lifecycle of a resolver instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Idle,
    Connecting,
    Polling,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidAction {
    Bid,
    Skip,
}

impl BidAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BidAction::Bid => "bid",
            BidAction::Skip => "skip",
        }
    }
}

/// Outcome of evaluating one auction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidDecision {
    pub order_id: String,
    /// `None` when not even the start price could be read
    pub current_price: Option<U256>,
    pub price_source: Option<PriceSource>,
    pub action: BidAction,
}

/// Polling resolver
pub struct ResolverEngine {
    /// Registry access
    client: Arc<dyn RegistryClient>,
    /// Bid-trigger policy
    strategy: Box<dyn BidStrategy>,
    /// Configuration
    config: ResolverConfig,
    /// Order ids already evaluated by this process
    processed: Mutex<HashSet<String>>,
    /// Current lifecycle state
    state: RwLock<ResolverState>,
    /// Decision fan-out for downstream settlement
    decision_tx: broadcast::Sender<BidDecision>,
    /// Shutdown flag
    shutdown: RwLock<bool>,
}

impl ResolverEngine {
    pub fn new(
        client: Arc<dyn RegistryClient>,
        strategy: Box<dyn BidStrategy>,
        config: ResolverConfig,
    ) -> Self {
        let (decision_tx, _) = broadcast::channel(1024);

        Self {
            client,
            strategy,
            config,
            processed: Mutex::new(HashSet::new()),
            state: RwLock::new(ResolverState::Idle),
            decision_tx,
            shutdown: RwLock::new(false),
        }
    }

    pub async fn state(&self) -> ResolverState {
        *self.state.read().await
    }

    async fn set_state(&self, state: ResolverState) {
        debug!("Resolver state -> {:?}", state);
        *self.state.write().await = state;
    }

    /// Subscribe to every bid decision the engine emits
    pub fn subscribe_decisions(&self) -> broadcast::Receiver<BidDecision> {
        self.decision_tx.subscribe()
    }

    /// Number of distinct auctions evaluated so far
    pub async fn processed_count(&self) -> usize {
        self.processed.lock().await.len()
    }

    /// Connect to the registry, then poll until stopped.
    ///
    /// Fails without polling if the registry stays unreachable for every
    /// startup attempt.
    pub async fn start(&self) -> CoordinatorResult<()> {
        self.set_state(ResolverState::Connecting).await;

        if let Err(e) = self.wait_for_server().await {
            self.set_state(ResolverState::Stopped).await;
            return Err(e);
        }

        self.set_state(ResolverState::Polling).await;
        self.run().await;
        Ok(())
    }

    /// Bounded startup handshake against `/health`
    pub async fn wait_for_server(&self) -> CoordinatorResult<HealthResponse> {
        let attempts = self.config.startup_max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.bounded("health check", self.client.health()).await {
                Ok(health) => {
                    info!(
                        "Registry reachable after {} attempt(s), {} auctions stored",
                        attempt, health.auctions
                    );
                    return Ok(health);
                }
                Err(e) => {
                    warn!("Waiting for registry ({}/{}): {}", attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        sleep(self.config.startup_retry_delay()).await;
                    }
                }
            }
        }

        Err(CoordinatorError::StartupFailed {
            attempts,
            last_error,
        })
    }

    /// Polling loop; a failed tick is logged and the next one runs on schedule
    pub async fn run(&self) {
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Resolver polling {} every {:?}",
            self.config.server_url,
            self.config.poll_interval()
        );

        loop {
            ticker.tick().await;
            if *self.shutdown.read().await {
                break;
            }

            match self.tick().await {
                Ok(decisions) => {
                    crate::metrics::record_tick(true);
                    if !decisions.is_empty() {
                        debug!("Evaluated {} new auctions", decisions.len());
                    }
                }
                Err(e) => {
                    crate::metrics::record_tick(false);
                    crate::metrics::record_fetch_error(&e);
                    log_fetch_error(&e);
                }
            }
        }

        self.set_state(ResolverState::Stopped).await;
        info!("Resolver stopped");
    }

    /// Fetch live auctions once and evaluate those not seen before
    pub async fn tick(&self) -> CoordinatorResult<Vec<BidDecision>> {
        let auctions = self
            .bounded("auction fetch", self.client.list_auctions())
            .await?;
        Ok(self.process_auctions(auctions, decay::unix_now()).await)
    }

    pub async fn process_auctions(&self, auctions: Vec<Auction>, now: u128) -> Vec<BidDecision> {
        let mut decisions = Vec::new();

        for auction in auctions {
            // mark before evaluating: a failed evaluation is not retried
            if !self.processed.lock().await.insert(auction.order_id.clone()) {
                continue;
            }

            let decision = self.evaluate(&auction, now);
            crate::metrics::record_decision(decision.action.as_str());
            // no subscribers is fine
            let _ = self.decision_tx.send(decision.clone());
            decisions.push(decision);
        }

        decisions
    }

    fn evaluate(&self, auction: &Auction, now: u128) -> BidDecision {
        info!(
            "Resolver sees auction: {} price range {} -> {}",
            auction.order_id, auction.start_price, auction.end_price
        );

        match decay::quote(auction, now) {
            Ok(quote) => {
                let action = if self.strategy.should_bid(auction, quote.price) {
                    BidAction::Bid
                } else {
                    BidAction::Skip
                };
                info!(
                    "Auction {} current price {} ({:?}): {}",
                    auction.order_id,
                    quote.price,
                    quote.source,
                    action.as_str()
                );

                BidDecision {
                    order_id: auction.order_id.clone(),
                    current_price: Some(quote.price),
                    price_source: Some(quote.source),
                    action,
                }
            }
            Err(e) => {
                error!(
                    "Auction {} has no usable price, skipping: {}",
                    auction.order_id, e
                );
                BidDecision {
                    order_id: auction.order_id.clone(),
                    current_price: None,
                    price_source: None,
                    action: BidAction::Skip,
                }
            }
        }
    }

    /// Stop after the in-flight tick, if any, completes
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Resolver shutdown initiated");
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = CoordinatorResult<T>>,
    ) -> CoordinatorResult<T> {
        match timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(CoordinatorError::Network {
                kind: NetworkErrorKind::Timeout,
                message: format!(
                    "{} timed out after {:?}",
                    operation,
                    self.config.request_timeout()
                ),
            }),
        }
    }
}

/// Next decision from a subscription, skipping over any it fell behind on.
///
/// `None` once the engine is gone.
pub async fn next_decision(rx: &mut broadcast::Receiver<BidDecision>) -> Option<BidDecision> {
    loop {
        match rx.recv().await {
            Ok(decision) => return Some(decision),
            Err(RecvError::Lagged(missed)) => {
                warn!("Decision subscriber lagged, {} decisions dropped", missed);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn log_fetch_error(e: &CoordinatorError) {
    match e.network_kind() {
        Some(NetworkErrorKind::ConnectionRefused) => {
            error!("Resolver failed to fetch auctions: registry refused the connection ({})", e)
        }
        Some(NetworkErrorKind::ConnectionReset) => {
            warn!("Resolver fetch interrupted: connection reset ({})", e)
        }
        Some(NetworkErrorKind::Timeout) => warn!("Resolver fetch timed out: {}", e),
        _ if e.is_retryable() => warn!("Resolver fetch failed, will retry next tick: {}", e),
        _ => error!("Resolver failed to fetch auctions: {}", e),
    }
}

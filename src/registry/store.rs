//! In-memory auction store
//!
//! Storage is append-only apart from explicit deletes and the optional
//! compaction pass. Staleness is never written back: it is evaluated on read
//! against the configured TTL, so `list` hides stale entries while `get`
//! still returns them.

use crate::config::{RegistryConfig, ValidationMode};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::model::numeric::pack_start_end_ts;
use crate::model::{generate_order_id, Auction, AuctionData, BroadcastRequest, DecayCurve};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Whether an auction is still within the registry's staleness window
pub fn is_live(auction: &Auction, now_ms: i64, ttl_ms: i64) -> bool {
    now_ms.saturating_sub(auction.timestamp) < ttl_ms
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Authoritative copy of all broadcast auctions
pub struct AuctionStore {
    auctions: RwLock<Vec<Auction>>,
    ttl_ms: i64,
    validation: ValidationMode,
}

impl AuctionStore {
    pub fn new(config: &RegistryConfig) -> Self {
        let ttl_ms = i64::try_from(config.auction_ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self::with_policy(ttl_ms, config.validation)
    }

    pub fn with_policy(ttl_ms: i64, validation: ValidationMode) -> Self {
        Self {
            auctions: RwLock::new(Vec::new()),
            ttl_ms,
            validation,
        }
    }

    /// Decode a raw broadcast body under the store's validation mode.
    ///
    /// Strict mode requires string core fields; permissive mode stringifies
    /// whatever it is given.
    pub fn parse_request(&self, body: Value) -> CoordinatorResult<BroadcastRequest> {
        let parsed = match self.validation {
            ValidationMode::Strict => serde_json::from_value(body),
            ValidationMode::Permissive => BroadcastRequest::from_lenient(body),
        };

        parsed.map_err(|e| {
            crate::metrics::record_auction_rejected();
            CoordinatorError::Validation(format!("Invalid auction payload: {}", e))
        })
    }

    /// Store a new auction and return it as persisted
    pub async fn create(&self, request: BroadcastRequest) -> CoordinatorResult<Auction> {
        self.create_at(request, now_ms()).await
    }

    pub async fn create_at(
        &self,
        request: BroadcastRequest,
        now_ms: i64,
    ) -> CoordinatorResult<Auction> {
        let order_id = if request.order_id.trim().is_empty() {
            generate_order_id(now_ms)
        } else {
            request.order_id.clone()
        };
        let auction = request.into_auction(order_id, now_ms);

        if self.validation == ValidationMode::Strict {
            if let Err(e) = validate_auction(&auction) {
                crate::metrics::record_auction_rejected();
                return Err(e);
            }
        }

        let mut auctions = self.auctions.write().await;
        if self.validation == ValidationMode::Strict
            && auctions.iter().any(|a| a.order_id == auction.order_id)
        {
            crate::metrics::record_auction_rejected();
            return Err(CoordinatorError::DuplicateAuction {
                order_id: auction.order_id,
            });
        }

        auctions.push(auction.clone());

        info!("New auction broadcast: {}", auction.order_id);
        debug!(
            "Auction {} start price {} end price {}",
            auction.order_id, auction.start_price, auction.end_price
        );
        info!("Total auctions: {}", auctions.len());
        crate::metrics::record_auction_broadcast(auctions.len());

        Ok(auction)
    }

    /// Auctions younger than the TTL, in insertion order
    pub async fn list_live(&self) -> Vec<Auction> {
        self.list_live_at(now_ms()).await
    }

    pub async fn list_live_at(&self, now_ms: i64) -> Vec<Auction> {
        self.auctions
            .read()
            .await
            .iter()
            .filter(|a| is_live(a, now_ms, self.ttl_ms))
            .cloned()
            .collect()
    }

    /// First stored auction with this id, stale or not
    pub async fn get(&self, order_id: &str) -> CoordinatorResult<Auction> {
        self.auctions
            .read()
            .await
            .iter()
            .find(|a| a.order_id == order_id)
            .cloned()
            .ok_or_else(|| CoordinatorError::AuctionNotFound {
                order_id: order_id.to_string(),
            })
    }

    /// Remove the first stored auction with this id
    pub async fn delete(&self, order_id: &str) -> CoordinatorResult<Auction> {
        let mut auctions = self.auctions.write().await;
        let index = auctions
            .iter()
            .position(|a| a.order_id == order_id)
            .ok_or_else(|| CoordinatorError::AuctionNotFound {
                order_id: order_id.to_string(),
            })?;

        let removed = auctions.remove(index);
        info!("Removed auction: {}", order_id);
        crate::metrics::record_auction_deleted(auctions.len());

        Ok(removed)
    }

    /// Number of stored auctions, including stale ones
    pub async fn len(&self) -> usize {
        self.auctions.read().await.len()
    }

    /// Drop every stale auction from storage, returning how many were removed
    pub async fn purge_stale_at(&self, now_ms: i64) -> usize {
        let mut auctions = self.auctions.write().await;
        let before = auctions.len();
        auctions.retain(|a| is_live(a, now_ms, self.ttl_ms));
        let removed = before - auctions.len();

        if removed > 0 {
            debug!("Compaction removed {} stale auctions", removed);
            crate::metrics::set_auctions_stored(auctions.len());
        }
        removed
    }
}

/// Boundary checks applied in strict mode
fn validate_auction(auction: &Auction) -> CoordinatorResult<()> {
    let curve = DecayCurve::from_auction(auction)
        .map_err(|e| CoordinatorError::Validation(e.to_string()))?;

    if curve.start_ts >= curve.end_ts {
        return Err(CoordinatorError::Validation(format!(
            "startEndTs must encode start < end, got start {} end {}",
            curve.start_ts, curve.end_ts
        )));
    }

    if curve.start_price < curve.end_price {
        return Err(CoordinatorError::Validation(format!(
            "startPrice {} is below endPrice {}",
            curve.start_price, curve.end_price
        )));
    }

    let blob = auction.auction_data.trim();
    if !blob.is_empty() && blob != "0x" {
        let data = AuctionData::decode(blob)
            .map_err(|e| CoordinatorError::Validation(e.to_string()))?;

        let mismatch = if data.start_end_ts != pack_start_end_ts(curve.start_ts, curve.end_ts) {
            Some("startEndTs")
        } else if data.start_price != curve.start_price {
            Some("startPrice")
        } else if data.end_price != curve.end_price {
            Some("endPrice")
        } else {
            None
        };

        if let Some(field) = mismatch {
            return Err(CoordinatorError::Validation(format!(
                "auctionData disagrees with declared {}",
                field
            )));
        }
    }

    Ok(())
}

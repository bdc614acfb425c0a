//! Auction registry: the shared bulletin board of broadcast auctions
//!
//! The store is owned explicitly and handed to the HTTP layer by `Arc`, so
//! several independent registries can coexist (tests rely on this).

mod store;

pub use store::{now_ms, AuctionStore};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Periodically drop stale auctions from storage
pub fn spawn_compaction(store: Arc<AuctionStore>, every: Duration) -> JoinHandle<()> {
    info!("Auction compaction enabled every {:?}", every);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.purge_stale_at(now_ms()).await;
        }
    })
}

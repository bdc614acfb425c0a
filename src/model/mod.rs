//! Wire and domain types shared by the registry and the resolver
//!
//! All 256-bit quantities travel as decimal strings so that no JSON consumer
//! loses precision above 2^53. The creation `timestamp` is a plain millisecond
//! count and stays a JSON number.

pub mod auction_data;
pub mod curve;
pub mod numeric;

pub use auction_data::AuctionData;
pub use curve::DecayCurve;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the registry; never taken from a broadcast payload
const REGISTRY_KEYS: [&str; 2] = ["timestamp", "status"];

/// Core payload keys carried as strings
const STRING_KEYS: [&str; 5] = ["orderId", "auctionData", "startPrice", "endPrice", "startEndTs"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    #[default]
    Active,
    Filled,
    Expired,
}

/// A broadcast Dutch auction as stored by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub order_id: String,
    #[serde(default)]
    pub order: Value,
    #[serde(default)]
    pub auction_data: String,
    #[serde(default)]
    pub start_price: String,
    #[serde(default)]
    pub end_price: String,
    #[serde(default)]
    pub start_end_ts: String,
    /// Milliseconds since epoch, stamped by the registry
    pub timestamp: i64,
    #[serde(default)]
    pub status: AuctionStatus,
    /// Producer-supplied keys outside the core schema (maker address, etc.)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /broadcast`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order: Value,
    #[serde(default)]
    pub auction_data: String,
    #[serde(default)]
    pub start_price: String,
    #[serde(default)]
    pub end_price: String,
    #[serde(default)]
    pub start_end_ts: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BroadcastRequest {
    /// Decode a payload whose core fields may not be strings.
    ///
    /// `null` becomes an empty string and any other non-string value is
    /// stored as its JSON text, so `"startPrice": 100` reads as `"100"`.
    pub fn from_lenient(mut body: Value) -> serde_json::Result<Self> {
        if let Value::Object(map) = &mut body {
            for key in STRING_KEYS {
                if let Some(value) = map.get_mut(key) {
                    let text = match &*value {
                        Value::String(_) => continue,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    *value = Value::String(text);
                }
            }
        }
        serde_json::from_value(body)
    }

    /// Stamp the payload into an active auction
    pub fn into_auction(self, order_id: String, now_ms: i64) -> Auction {
        let mut extra = self.extra;
        for key in REGISTRY_KEYS {
            extra.remove(key);
        }

        Auction {
            order_id,
            order: self.order,
            auction_data: self.auction_data,
            start_price: self.start_price,
            end_price: self.end_price,
            start_end_ts: self.start_end_ts,
            timestamp: now_ms,
            status: AuctionStatus::Active,
            extra,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub success: bool,
    pub auction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub auctions: usize,
}

/// Registry-assigned identifier in the form `order-<ms>-<9 chars>`
pub fn generate_order_id(now_ms: i64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("order-{}-{}", now_ms, &suffix[..9])
}

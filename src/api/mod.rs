//! HTTP API of the auction registry

mod error;

use error::ApiError;

use crate::config::RegistryConfig;
use crate::error::CoordinatorResult;
use crate::model::{Auction, BroadcastResponse, DeleteResponse, HealthResponse};
use crate::registry::AuctionStore;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AuctionStore>,
}

/// Build the registry router over an explicitly owned store
pub fn router(store: Arc<AuctionStore>) -> Router {
    Router::new()
        .route("/broadcast", post(broadcast))
        .route("/auctions", get(list_auctions))
        .route("/auction/:order_id", get(get_auction).delete(delete_auction))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { store })
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run_server(
    config: RegistryConfig,
    store: Arc<AuctionStore>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> CoordinatorResult<()> {
    let app = router(store);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Auction server running on http://{}", listener.local_addr()?);
    info!("Health check: http://{}/health", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn broadcast(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let Json(body) = payload?;
    let request = state.store.parse_request(body)?;
    let auction = state.store.create(request).await?;

    Ok(Json(BroadcastResponse {
        success: true,
        auction_id: auction.order_id,
    }))
}

/// Live auctions only; stale entries stay in storage
async fn list_auctions(State(state): State<AppState>) -> Json<Vec<Auction>> {
    Json(state.store.list_live().await)
}

async fn get_auction(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Auction>, ApiError> {
    Ok(Json(state.store.get(&order_id).await?))
}

async fn delete_auction(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.store.delete(&order_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        auctions: state.store.len().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;
    use crate::model::numeric::pack_start_end_ts;
    use crate::model::BroadcastRequest;
    use crate::registry::now_ms;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn store() -> Arc<AuctionStore> {
        Arc::new(AuctionStore::with_policy(DAY_MS, ValidationMode::Strict))
    }

    fn payload(order_id: &str) -> Value {
        json!({
            "orderId": order_id,
            "order": { "maker": "0x0000000000000000000000000000000000000001" },
            "auctionData": "0x",
            "startPrice": "100000000000000000",
            "endPrice": "50000000000000000",
            "startEndTs": pack_start_end_ts(1_700_000_000, 1_700_000_120).to_string(),
            "auctionContract": "0x0000000000000000000000000000000000000002"
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_broadcast_then_get_round_trip() {
        let app = router(store());

        let (status, body) = send(&app, "POST", "/broadcast", Some(payload("A1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "auctionId": "A1" }));

        let (status, auction) = send(&app, "GET", "/auction/A1", None).await;
        assert_eq!(status, StatusCode::OK);
        let sent = payload("A1");
        for key in ["orderId", "order", "auctionData", "startPrice", "endPrice", "startEndTs", "auctionContract"] {
            assert_eq!(auction[key], sent[key], "field {}", key);
        }
        assert_eq!(auction["status"], "active");
        assert!(auction["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_list_and_health() {
        let app = router(store());
        send(&app, "POST", "/broadcast", Some(payload("A1"))).await;
        send(&app, "POST", "/broadcast", Some(payload("A2"))).await;

        let (status, list) = send(&app, "GET", "/auctions", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["orderId"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["A1", "A2"]);

        let (status, health) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health, json!({ "status": "healthy", "auctions": 2 }));
    }

    #[tokio::test]
    async fn test_stale_auction_listing() {
        let store = store();
        let request: BroadcastRequest = serde_json::from_value(payload("A1")).unwrap();
        store
            .create_at(request, now_ms() - 25 * 60 * 60 * 1000)
            .await
            .unwrap();
        let app = router(store);

        let (_, list) = send(&app, "GET", "/auctions", None).await;
        assert_eq!(list, json!([]));

        let (status, auction) = send(&app, "GET", "/auction/A1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(auction["orderId"], "A1");
    }

    #[tokio::test]
    async fn test_delete_and_not_found() {
        let app = router(store());
        send(&app, "POST", "/broadcast", Some(payload("A1"))).await;

        let (status, body) = send(&app, "DELETE", "/auction/A1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, body) = send(&app, "GET", "/auction/A1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Auction not found");

        let (status, _) = send(&app, "DELETE", "/auction/A1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_broadcast_rejections() {
        let app = router(store());

        let mut bad = payload("B1");
        bad["startPrice"] = json!("one hundred");
        let (status, body) = send(&app, "POST", "/broadcast", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        send(&app, "POST", "/broadcast", Some(payload("B2"))).await;
        let (status, _) = send(&app, "POST", "/broadcast", Some(payload("B2"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, "POST", "/broadcast", Some(json!([1, 2, 3]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_permissive_registry_accepts_non_string_fields() {
        let permissive = Arc::new(AuctionStore::with_policy(DAY_MS, ValidationMode::Permissive));
        let app = router(permissive);

        let mut body = payload("ignored");
        body["orderId"] = json!(42);
        body["startPrice"] = json!(100);
        body["auctionData"] = Value::Null;
        let (status, response) = send(&app, "POST", "/broadcast", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, json!({ "success": true, "auctionId": "42" }));

        let (status, auction) = send(&app, "GET", "/auction/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(auction["startPrice"], "100");
        assert_eq!(auction["auctionData"], "");
        assert_eq!(auction["endPrice"], "50000000000000000");

        let strict = router(store());
        let (status, response) = send(&strict, "POST", "/broadcast", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
    }
}

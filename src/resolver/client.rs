//! Registry client used by resolvers and makers

use crate::error::{CoordinatorError, CoordinatorResult, NetworkErrorKind};
use crate::model::{Auction, BroadcastRequest, BroadcastResponse, DeleteResponse, HealthResponse};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::error::Error as _;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Request/response contract of the auction registry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn broadcast(&self, request: &BroadcastRequest) -> CoordinatorResult<BroadcastResponse>;

    /// Live auctions, already filtered by the registry
    async fn list_auctions(&self) -> CoordinatorResult<Vec<Auction>>;

    async fn get_auction(&self, order_id: &str) -> CoordinatorResult<Auction>;

    async fn delete_auction(&self, order_id: &str) -> CoordinatorResult<()>;

    async fn health(&self) -> CoordinatorResult<HealthResponse>;
}

/// JSON-over-HTTP registry client
pub struct HttpRegistryClient {
    client: Client,
    base_url: String,
    base: Url,
}

impl HttpRegistryClient {
    /// Create a client whose every request is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> CoordinatorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CoordinatorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base = Url::parse(base_url)
            .map_err(|e| CoordinatorError::Config(format!("Invalid registry URL {:?}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(CoordinatorError::Config(format!(
                "Registry URL {:?} cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/auction/<id>` with the id percent-encoded as a single segment
    fn auction_url(&self, order_id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("auction").push(order_id);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        order_id: Option<&str>,
    ) -> CoordinatorResult<T> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if status == StatusCode::NOT_FOUND {
            if let Some(order_id) = order_id {
                return Err(CoordinatorError::AuctionNotFound {
                    order_id: order_id.to_string(),
                });
            }
        }

        if !status.is_success() {
            return Err(CoordinatorError::RegistryStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn broadcast(&self, request: &BroadcastRequest) -> CoordinatorResult<BroadcastResponse> {
        debug!("Broadcasting auction {:?} to {}", request.order_id, self.base_url);
        self.send(self.client.post(self.url("/broadcast")).json(request), None)
            .await
    }

    async fn list_auctions(&self) -> CoordinatorResult<Vec<Auction>> {
        self.send(self.client.get(self.url("/auctions")), None).await
    }

    async fn get_auction(&self, order_id: &str) -> CoordinatorResult<Auction> {
        let url = self.auction_url(order_id);
        self.send(self.client.get(url), Some(order_id)).await
    }

    async fn delete_auction(&self, order_id: &str) -> CoordinatorResult<()> {
        let url = self.auction_url(order_id);
        let _: DeleteResponse = self.send(self.client.delete(url), Some(order_id)).await?;
        Ok(())
    }

    async fn health(&self) -> CoordinatorResult<HealthResponse> {
        self.send(self.client.get(self.url("/health")), None).await
    }
}

fn network_error(err: reqwest::Error) -> CoordinatorError {
    CoordinatorError::Network {
        kind: classify(&err),
        message: err.to_string(),
    }
}

/// Classify a transport failure by walking its source chain
pub fn classify(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return NetworkErrorKind::ConnectionRefused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => return NetworkErrorKind::ConnectionReset,
                io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                _ => {}
            }
        }
        source = inner.source();
    }

    NetworkErrorKind::Other
}

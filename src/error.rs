//! Error types for the auction coordinator

use std::fmt;
use thiserror::Error;

/// Classification of a failed registry round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionRefused,
    ConnectionReset,
    Timeout,
    Other,
}

impl NetworkErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkErrorKind::ConnectionRefused => "connection_refused",
            NetworkErrorKind::ConnectionReset => "connection_reset",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to evaluate an auction's decay curve
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecayError {
    #[error("Malformed {field}: {value:?}")]
    Malformed { field: &'static str, value: String },

    #[error("Start price {start} is below end price {end}")]
    InvertedPrices { start: String, end: String },
}

/// Main error type for the coordinator
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid auction: {0}")]
    Validation(String),

    #[error("Auction {order_id} already exists")]
    DuplicateAuction { order_id: String },

    #[error("Auction not found")]
    AuctionNotFound { order_id: String },

    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("Registry responded with {status}: {body}")]
    RegistryStatus { status: u16, body: String },

    #[error("Registry unreachable after {attempts} attempts: {last_error}")]
    StartupFailed { attempts: u32, last_error: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoordinatorError {
    /// Check if error is transient and the operation may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            CoordinatorError::Network { .. } => true,
            CoordinatorError::RegistryStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Network classification, if this is a network error
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            CoordinatorError::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

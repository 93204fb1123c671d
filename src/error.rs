use thiserror::Error;
use crate::types::ids::RouteId;
use crate::types::timestamp::Timestamp;

#[derive(Error, Debug)]
pub enum Error {
    // Payload Decoder Errors
    #[error("Malformed payload at byte {offset}: {reason}")]
    MalformedPayload {
        offset: usize,
        reason: String,
    },

    // Normalization Errors
    #[error("Non-positive price: {0} minor units")]
    NonPositivePrice(i64),

    #[error("Unrecognized currency: {0:?}")]
    UnrecognizedCurrency(String),

    #[error("Implausible price {price} (accepted range {min}..={max})")]
    ImplausiblePrice {
        price: i64,
        min: i64,
        max: i64,
    },

    // Price Store Errors
    #[error("Store persistence failed for route {route_id}: {reason}")]
    StorePersistence {
        route_id: RouteId,
        reason: String,
    },

    #[error("Out of order sample for route {route_id}: latest={latest}, got={got}")]
    OutOfOrderSample {
        route_id: RouteId,
        latest: Timestamp,
        got: Timestamp,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    // External Collaborator Errors
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Timed out during {stage} after {after_ms}ms")]
    Timeout {
        stage: &'static str,
        after_ms: u64,
    },

    #[error("Notifier failed: {0}")]
    Notifier(String),

    #[error("Route task aborted: {0}")]
    TaskAborted(String),

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure classes used for metric labels and cycle summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Payload,
    Normalization,
    Persistence,
    Fetch,
    Timeout,
    Other,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Payload => "payload",
            FailureCategory::Normalization => "normalization",
            FailureCategory::Persistence => "persistence",
            FailureCategory::Fetch => "fetch",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Other => "other",
        }
    }
}

impl Error {
    pub fn category(&self) -> FailureCategory {
        match self {
            Error::MalformedPayload { .. } | Error::DeserializationError(_) => FailureCategory::Payload,
            Error::NonPositivePrice(_)
            | Error::UnrecognizedCurrency(_)
            | Error::ImplausiblePrice { .. } => FailureCategory::Normalization,
            Error::StorePersistence { .. }
            | Error::OutOfOrderSample { .. }
            | Error::SerializationError(_)
            | Error::IoError(_) => FailureCategory::Persistence,
            Error::Fetch(_) => FailureCategory::Fetch,
            Error::Timeout { .. } => FailureCategory::Timeout,
            Error::Notifier(_)
            | Error::TaskAborted(_)
            | Error::ConfigError(_)
            | Error::Metrics(_) => FailureCategory::Other,
        }
    }

    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedPayload {
            offset,
            reason: reason.into(),
        }
    }
}

//! Error types for the pipeline.

use std::time::Duration;
use thiserror::Error;

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Check whether the error is expected contention/flakiness that a
    /// polling stage should absorb and retry on its next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Store(e) => e.is_transient(),
            PipelineError::Gateway(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Durable store errors.
///
/// `Busy` is the only transient variant; it is retried with backoff inside
/// the store layer and only surfaces once retries are exhausted.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store busy")]
    Busy,

    #[error("open signal already exists for {symbol} {side}")]
    Conflict { symbol: String, side: String },

    #[error("version conflict on signal {id}: expected version {expected}")]
    VersionConflict { id: i64, expected: i64 },

    #[error("signal {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy)
    }
}

/// Broker gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("server error: {0}")]
    ServerError(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("circuit breaker open")]
    CircuitOpen,
}

impl GatewayError {
    /// Retryable within a stage tick or on the next polling cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout(_)
                | GatewayError::Connection(_)
                | GatewayError::RateLimited { .. }
                | GatewayError::ServerError(_)
                | GatewayError::CircuitOpen
        )
    }

    /// Counts toward tripping the circuit breaker.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            GatewayError::Authentication(_) | GatewayError::ServerError(_)
        )
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

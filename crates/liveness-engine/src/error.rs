//! Error types for the workload engine and its capabilities.

use crate::engine::EngineState;
use thiserror::Error;

/// Errors raised by a database capability.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed an operation.
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A document could not be converted for storage.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The backend is not reachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Errors returned by the rate limiter.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AcquireError {
    /// The limiter was stopped before the tokens became available.
    #[error("Rate limiter stopped")]
    Stopped,

    /// The request can never be satisfied by this bucket.
    #[error("Requested {requested} tokens but bucket capacity is {capacity}")]
    ExceedsCapacity { requested: f64, capacity: f64 },
}

/// Errors returned by engine lifecycle calls.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("Cannot {action} the engine while it is {state}")]
    InvalidTransition {
        action: &'static str,
        state: EngineState,
    },
}

//! Error types for the MongoDB backend.

use thiserror::Error;

/// Errors that can occur while talking to MongoDB.
#[derive(Error, Debug)]
pub enum MongoStoreError {
    /// MongoDB connection or command error.
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    /// A server reply did not have the expected shape.
    #[error("Unexpected reply to {command}: {reason}")]
    UnexpectedReply {
        command: &'static str,
        reason: String,
    },
}

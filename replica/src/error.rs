//! Error types for replica operations.

use thiserror::Error;

/// Failures reported by a [`RemoteStore`](crate::RemoteStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("gRPC status error: {0}")]
    Status(#[from] tonic::Status),

    #[error("invalid store endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("auth token is not a valid header value")]
    InvalidToken,

    #[error("connection closed")]
    ConnectionClosed,
}

/// Outcome errors of cache operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any network call.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The id is not in the local replica.
    #[error("no case with id {0:?}")]
    NotFound(String),

    /// The remote store rejected or failed the mutation.
    #[error("store error: {0}")]
    Io(#[from] StoreError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

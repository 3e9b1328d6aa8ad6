//! Error types for lwrp-client.

use thiserror::Error;

/// Main error type for all LWRP client operations.
#[derive(Debug, Error)]
pub enum LwrpError {
    /// Opening the TCP connection failed (refused or unreachable).
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Fatal socket failure after connect; terminates the receive loop.
    /// A would-block read is not an error and never surfaces here.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied value rejected before anything reached the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The receive loop has exited; commands can no longer be queued.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using LwrpError.
pub type Result<T> = std::result::Result<T, LwrpError>;

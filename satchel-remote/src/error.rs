//! Error types for the remote gateway.

use satchel_types::FileId;
use thiserror::Error;

/// Result type for gateway operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur talking to the remote server.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure. Transient: safe to retry the sync later.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out. Transient.
    #[error("request timed out")]
    Timeout,

    /// The server answered but the response was malformed. Fatal for the
    /// sync pass.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server returned an error status. Transient (server-side hiccup).
    #[error("server error: HTTP {0}")]
    Server(u16),

    /// The request's signature was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The server has no such entry or content.
    #[error("not found on server: {0}")]
    NotFound(FileId),

    /// A metadata push was rejected because the server's copy moved past
    /// the diff's `old` state. Re-running the sync pulls the newer state
    /// and resolves the divergence.
    #[error("stale diff for {0}: server has a newer version")]
    StaleDiff(FileId),
}

impl RemoteError {
    /// True for failures where retrying the whole sync later is expected
    /// to succeed without any local repair.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Server(_))
    }
}

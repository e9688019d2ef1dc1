//! Error types for the sync engine.

use crate::work::WorkUnit;
use satchel_crypto::CryptoError;
use satchel_remote::RemoteError;
use satchel_store::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// What went wrong while applying one unit.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The plan and the store disagree in a way that should not happen
    /// (e.g. a unit for an id with no state on either side).
    #[error("inconsistent plan: {0}")]
    InconsistentPlan(String),
}

/// Errors that can end a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another synchronize() is running against the same store.
    #[error("sync already in progress")]
    AlreadySyncing,

    /// One unit failed; everything before it stayed committed. The unit
    /// carries id, direction, and kind, which is enough context to resume
    /// or report precisely.
    #[error("unit [{unit}] failed: {source}")]
    Unit {
        unit: WorkUnit,
        #[source]
        source: UnitError,
    },

    /// Failure outside any unit (fetching the change feed, reading the
    /// cursor).
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl SyncError {
    /// True when re-running synchronize() later is expected to succeed
    /// without any local repair.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AlreadySyncing => true,
            Self::Unit { source: UnitError::Remote(e), .. } | Self::Remote(e) => e.is_transient(),
            _ => false,
        }
    }
}

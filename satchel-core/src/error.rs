//! Error types for the core surface.
//!
//! Everything outward-facing returns a structured result; the adaptation
//! layer above this crate turns these into whatever its host language
//! wants.

use satchel_types::FileId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Input rejected before any mutation; fully recoverable by the caller
/// correcting the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no such entry: {0}")]
    NotFound(FileId),

    #[error("entry is deleted: {0}")]
    Deleted(FileId),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("a sibling is already named {0:?}")]
    DuplicateSiblingName(String),

    #[error("parent {0} is not a folder")]
    ParentNotAFolder(FileId),

    #[error("moving {0} under its own descendant would create a cycle")]
    Cycle(FileId),

    #[error("the root folder cannot be renamed, moved, or deleted")]
    RootImmutable,

    #[error("entry {0} is not a document")]
    NotADocument(FileId),

    #[error("entry {0} is not deleted; only tombstoned entries can be purged")]
    NotDeleted(FileId),

    #[error("no path component {0:?}")]
    NoSuchPath(String),
}

/// Errors from the core surface.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] satchel_store::StorageError),

    #[error(transparent)]
    Crypto(#[from] satchel_crypto::CryptoError),

    #[error(transparent)]
    Sync(#[from] satchel_sync::SyncError),

    #[error("invalid account string: {0}")]
    InvalidAccount(String),

    #[error("store has no account; create or restore one first")]
    NoAccount,
}

//! SQLite storage layer for Satchel.
//!
//! One database file holds everything the client owns: the file-tree
//! metadata, the encrypted document contents, and the sync cursor.
//!
//! # Architecture
//!
//! Metadata lives in two tables. `base_metadata` is the last state confirmed
//! synced with the server, the common ancestor the work calculator diffs
//! against. `local_metadata` is a sparse overlay of entries edited offline;
//! an id present there is "dirty" and will be pushed on the next sync. The
//! *staged* view (local overlaid on base) is what callers see as the current
//! tree.
//!
//! Every work-unit commit runs inside a single SQLite transaction via
//! [`Db::with_tx`], so concurrent readers observe the tree before or after a
//! unit, never mid-unit. The connection mutex is held per operation, not per
//! sync pass, which lets reads interleave with a running sync.

mod content_store;
mod db;
mod error;
mod metadata_store;
mod ops;

pub use content_store::ContentStore;
pub use db::{Db, Tx};
pub use error::{StorageError, StorageResult};
pub use metadata_store::MetadataStore;

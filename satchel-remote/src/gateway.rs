//! The gateway contract the sync engine consumes.

use crate::error::RemoteResult;
use crate::protocol::{ChangeSet, MetadataDiff};
use async_trait::async_trait;
use satchel_crypto::EncryptedBytes;
use satchel_types::{Cursor, FileId};

/// Stateless request/response client for the remote server.
///
/// Calls block the orchestration task until they complete or time out; the
/// engine never issues two gateway calls concurrently within one sync pass.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Returns every metadata change recorded after `since`, newest state
    /// per id, plus the sequence high-water mark.
    async fn fetch_changes(&self, since: Cursor) -> RemoteResult<ChangeSet>;

    /// Pushes one metadata diff. Returns the server sequence assigned to
    /// the new state. Rejects stale diffs.
    async fn push_metadata(&self, diff: &MetadataDiff) -> RemoteResult<Cursor>;

    /// Fetches one document's ciphertext.
    async fn fetch_content(&self, id: FileId) -> RemoteResult<EncryptedBytes>;

    /// Pushes one document's ciphertext. The entry's metadata must already
    /// exist on the server.
    async fn push_content(&self, id: FileId, content: &EncryptedBytes) -> RemoteResult<()>;
}

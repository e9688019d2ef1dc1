//! In-process reference server.
//!
//! Backs tests and local development with the same contract the real
//! server honors: a global sequence counter, newest-state-per-id change
//! feeds, and compare-and-set metadata pushes. State lives in memory and
//! dies with the process.

use crate::error::{RemoteError, RemoteResult};
use crate::gateway::RemoteGateway;
use crate::protocol::{ChangeSet, MetadataDiff, RemoteChange, RemoteFileMetadata};
use async_trait::async_trait;
use satchel_crypto::EncryptedBytes;
use satchel_types::{Cursor, FileId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct ServerState {
    /// Global sequence counter; every accepted push increments it.
    seq: u64,
    /// Newest metadata per id and the sequence it was recorded at.
    files: HashMap<FileId, (u64, RemoteFileMetadata)>,
    /// Ciphertext per document id.
    contents: HashMap<FileId, EncryptedBytes>,
}

/// An in-memory [`RemoteGateway`].
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<ServerState>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RemoteResult<MutexGuard<'_, ServerState>> {
        self.state
            .lock()
            .map_err(|_| RemoteError::Protocol("reference server state poisoned".to_string()))
    }

    /// Number of metadata entries the server holds. Test observability.
    pub fn entry_count(&self) -> usize {
        self.state.lock().map(|s| s.files.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn fetch_changes(&self, since: Cursor) -> RemoteResult<ChangeSet> {
        let state = self.lock()?;
        let mut changes: Vec<RemoteChange> = state
            .files
            .values()
            .filter(|(seq, _)| *seq > since.value())
            .map(|(seq, metadata)| RemoteChange { seq: *seq, metadata: metadata.clone() })
            .collect();
        changes.sort_by_key(|c| c.seq);
        debug!(since = since.value(), count = changes.len(), "fetch_changes");
        Ok(ChangeSet { changes, as_of: Cursor::new(state.seq) })
    }

    async fn push_metadata(&self, diff: &MetadataDiff) -> RemoteResult<Cursor> {
        let mut state = self.lock()?;
        let id = diff.new.id;

        // Compare-and-set on the version marker: ciphertext differs per
        // encryption, so byte equality of names is meaningless here.
        let current_version = state.files.get(&id).map(|(_, m)| m.content_version);
        let expected = diff.old.as_ref().map(|m| m.content_version);
        if current_version != expected {
            debug!(%id, ?current_version, ?expected, "rejecting stale diff");
            return Err(RemoteError::StaleDiff(id));
        }

        state.seq += 1;
        let seq = state.seq;
        state.files.insert(id, (seq, diff.new.clone()));
        Ok(Cursor::new(seq))
    }

    async fn fetch_content(&self, id: FileId) -> RemoteResult<EncryptedBytes> {
        let state = self.lock()?;
        state
            .contents
            .get(&id)
            .cloned()
            .ok_or(RemoteError::NotFound(id))
    }

    async fn push_content(&self, id: FileId, content: &EncryptedBytes) -> RemoteResult<()> {
        let mut state = self.lock()?;
        if !state.files.contains_key(&id) {
            return Err(RemoteError::NotFound(id));
        }
        state.contents.insert(id, content.clone());
        Ok(())
    }
}

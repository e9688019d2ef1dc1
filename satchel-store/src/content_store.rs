//! Encrypted document content storage.
//!
//! Contents are stored exactly as the crypto layer produced them; this
//! store never sees plaintext. An entry's content outlives its tombstone
//! and is removed only by an explicit purge.

use crate::db::Db;
use crate::error::StorageResult;
use crate::ops;
use satchel_crypto::EncryptedBytes;
use satchel_types::FileId;

/// The local content store: encrypted bytes keyed 1:1 by document id.
#[derive(Clone)]
pub struct ContentStore {
    db: Db,
}

impl ContentStore {
    /// Creates a view over an open database.
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Writes (or replaces) a document's encrypted content.
    pub fn put(&self, id: FileId, content: &EncryptedBytes) -> StorageResult<()> {
        self.db.with_conn(|conn| ops::document_put(conn, id, content))
    }

    /// Reads a document's encrypted content.
    pub fn get(&self, id: FileId) -> StorageResult<Option<EncryptedBytes>> {
        self.db.with_conn(|conn| ops::document_get(conn, id))
    }

    /// Removes a document's content. Only purge paths call this.
    pub fn remove(&self, id: FileId) -> StorageResult<()> {
        self.db.with_conn(|conn| ops::document_remove(conn, id))
    }
}

//! Read/write access to file-tree metadata and the sync cursor.

use crate::db::Db;
use crate::error::StorageResult;
use crate::ops;
use satchel_types::{Cursor, FileId, FileMetadata};

/// The local metadata store: the staged file tree, its base/overlay tables,
/// and the sync cursor. A thin view over the shared [`Db`]; multi-step
/// mutations that must be atomic go through [`Db::with_tx`] instead.
#[derive(Clone)]
pub struct MetadataStore {
    db: Db,
}

impl MetadataStore {
    /// Creates a view over an open database.
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The staged (current) state of an entry.
    pub fn get(&self, id: FileId) -> StorageResult<Option<FileMetadata>> {
        self.db.with_conn(|conn| ops::staged_get(conn, id))
    }

    /// Every staged entry, tombstoned ones included, ordered by id.
    pub fn all(&self) -> StorageResult<Vec<FileMetadata>> {
        self.db.with_conn(ops::staged_all)
    }

    /// Staged children of a folder, tombstoned entries included.
    pub fn children(&self, parent: FileId) -> StorageResult<Vec<FileMetadata>> {
        self.db.with_conn(|conn| ops::staged_children(conn, parent))
    }

    /// Staged descendants of an entry, breadth-first.
    pub fn descendants(&self, id: FileId) -> StorageResult<Vec<FileMetadata>> {
        self.db.with_conn(|conn| ops::staged_descendants(conn, id))
    }

    /// The last state confirmed synced with the server.
    pub fn base_get(&self, id: FileId) -> StorageResult<Option<FileMetadata>> {
        self.db.with_conn(|conn| ops::meta_get(conn, "base_metadata", id))
    }

    /// Entries with unsynced local edits.
    pub fn dirty(&self) -> StorageResult<Vec<FileMetadata>> {
        self.db.with_conn(|conn| ops::meta_all(conn, "local_metadata"))
    }

    /// Stages a local edit. The entry becomes dirty and will be pushed on
    /// the next sync.
    pub fn stage(&self, meta: &FileMetadata) -> StorageResult<()> {
        self.db.with_conn(|conn| ops::meta_upsert(conn, "local_metadata", meta))
    }

    /// The id of the account's root folder, once known.
    pub fn root(&self) -> StorageResult<Option<FileId>> {
        self.db.with_conn(ops::root_get)
    }

    pub fn set_root(&self, id: FileId) -> StorageResult<()> {
        self.db.with_conn(|conn| ops::root_set(conn, id))
    }

    /// The sync cursor: how much remote history is incorporated locally.
    pub fn cursor(&self) -> StorageResult<Cursor> {
        self.db.with_conn(ops::cursor_get)
    }

    pub fn set_cursor(&self, cursor: Cursor) -> StorageResult<()> {
        self.db.with_conn(|conn| ops::cursor_set(conn, cursor))
    }
}

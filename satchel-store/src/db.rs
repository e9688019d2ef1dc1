//! Connection management and the per-unit transaction wrapper.

use crate::error::{StorageError, StorageResult};
use crate::ops;
use rusqlite::{Connection, TransactionBehavior};
use satchel_crypto::EncryptedBytes;
use satchel_types::{Cursor, FileId, FileMetadata};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS base_metadata (
    id   TEXT PRIMARY KEY,
    meta TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS local_metadata (
    id   TEXT PRIMARY KEY,
    meta TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS documents (
    id    TEXT PRIMARY KEY,
    nonce BLOB NOT NULL,
    body  BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS sync_state (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Shared handle to the local database. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Opens (or creates) the database at `path` in WAL mode.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        // journal_mode returns a row, so set it via execute_batch
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::init(conn)
    }

    /// Opens an in-memory database, for tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!("local store schema initialized");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Corruption("store mutex poisoned".to_string()))
    }

    /// Runs `f` against the connection without an explicit transaction.
    /// Single reads are already atomic in SQLite.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside one immediate transaction. Commits on `Ok`, rolls
    /// back on `Err`. This is the atomicity boundary of a work unit: a
    /// unit's metadata write, content write, and cursor advance all happen
    /// in one call, so a crash leaves the store at a unit boundary.
    pub fn with_tx<T>(&self, f: impl FnOnce(&Tx<'_>) -> StorageResult<T>) -> StorageResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let wrapped = Tx { inner: tx };
        match f(&wrapped) {
            Ok(value) => {
                wrapped.inner.commit()?;
                Ok(value)
            }
            Err(err) => Err(err), // dropping the transaction rolls back
        }
    }
}

/// An open transaction exposing every store operation. All mutations the
/// engine performs go through one of these.
pub struct Tx<'a> {
    inner: rusqlite::Transaction<'a>,
}

impl Tx<'_> {
    // ── Metadata: base table ─────────────────────────────────────

    pub fn base_get(&self, id: FileId) -> StorageResult<Option<FileMetadata>> {
        ops::meta_get(&self.inner, "base_metadata", id)
    }

    pub fn all_base(&self) -> StorageResult<Vec<FileMetadata>> {
        ops::meta_all(&self.inner, "base_metadata")
    }

    pub fn upsert_base(&self, meta: &FileMetadata) -> StorageResult<()> {
        ops::meta_upsert(&self.inner, "base_metadata", meta)
    }

    // ── Metadata: local overlay ──────────────────────────────────

    pub fn local_get(&self, id: FileId) -> StorageResult<Option<FileMetadata>> {
        ops::meta_get(&self.inner, "local_metadata", id)
    }

    pub fn dirty(&self) -> StorageResult<Vec<FileMetadata>> {
        ops::meta_all(&self.inner, "local_metadata")
    }

    pub fn upsert_local(&self, meta: &FileMetadata) -> StorageResult<()> {
        ops::meta_upsert(&self.inner, "local_metadata", meta)
    }

    pub fn remove_local(&self, id: FileId) -> StorageResult<()> {
        ops::meta_remove(&self.inner, "local_metadata", id)
    }

    /// Moves an entry's local overlay into base after a successful push.
    /// No-op when the id is not dirty.
    pub fn promote_local(&self, id: FileId) -> StorageResult<()> {
        if let Some(meta) = self.local_get(id)? {
            self.upsert_base(&meta)?;
            self.remove_local(id)?;
        }
        Ok(())
    }

    // ── Metadata: staged view (local overlaid on base) ───────────

    pub fn get(&self, id: FileId) -> StorageResult<Option<FileMetadata>> {
        ops::staged_get(&self.inner, id)
    }

    pub fn all(&self) -> StorageResult<Vec<FileMetadata>> {
        ops::staged_all(&self.inner)
    }

    /// Staged children of a folder, tombstoned entries included.
    pub fn children(&self, parent: FileId) -> StorageResult<Vec<FileMetadata>> {
        ops::staged_children(&self.inner, parent)
    }

    /// Staged descendants of an entry, in breadth-first order, tombstoned
    /// entries included. The entry itself is not part of the result.
    pub fn descendants(&self, id: FileId) -> StorageResult<Vec<FileMetadata>> {
        ops::staged_descendants(&self.inner, id)
    }

    // ── Content ──────────────────────────────────────────────────

    pub fn put_document(&self, id: FileId, content: &EncryptedBytes) -> StorageResult<()> {
        ops::document_put(&self.inner, id, content)
    }

    pub fn get_document(&self, id: FileId) -> StorageResult<Option<EncryptedBytes>> {
        ops::document_get(&self.inner, id)
    }

    pub fn remove_document(&self, id: FileId) -> StorageResult<()> {
        ops::document_remove(&self.inner, id)
    }

    // ── Sync state ───────────────────────────────────────────────

    pub fn cursor(&self) -> StorageResult<Cursor> {
        ops::cursor_get(&self.inner)
    }

    pub fn set_cursor(&self, cursor: Cursor) -> StorageResult<()> {
        ops::cursor_set(&self.inner, cursor)
    }

    pub fn root(&self) -> StorageResult<Option<FileId>> {
        ops::root_get(&self.inner)
    }

    pub fn set_root(&self, id: FileId) -> StorageResult<()> {
        ops::root_set(&self.inner, id)
    }

    pub fn account_json(&self) -> StorageResult<Option<String>> {
        ops::kv_get(&self.inner, "account")
    }

    pub fn set_account_json(&self, json: &str) -> StorageResult<()> {
        ops::kv_set(&self.inner, "account", json)
    }

    // ── Purge ────────────────────────────────────────────────────

    /// Permanently removes an entry's metadata (both tables) and content.
    /// The caller is responsible for only purging tombstoned entries.
    pub fn purge(&self, id: FileId) -> StorageResult<()> {
        ops::meta_remove(&self.inner, "base_metadata", id)?;
        ops::meta_remove(&self.inner, "local_metadata", id)?;
        ops::document_remove(&self.inner, id)
    }
}

//! Shared test helpers for the sync engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use satchel_crypto::{encrypt, EncryptedBytes, MasterKey};
use satchel_remote::{ChangeSet, MemoryGateway, MetadataDiff, RemoteError, RemoteFileMetadata, RemoteGateway};
use satchel_store::Db;
use satchel_types::{Cursor, FileId, FileKind, FileMetadata};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opt-in log output for debugging a failing test: `RUST_LOG=debug`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic account key shared by every simulated client.
pub fn key() -> MasterKey {
    MasterKey::from_bytes([11u8; 32])
}

/// A fresh local store with a root folder staged for push.
pub fn db_with_root() -> (Db, FileMetadata) {
    let db = Db::open_in_memory().unwrap();
    let root = FileMetadata::root("alice");
    db.with_tx(|tx| {
        tx.set_root(root.id)?;
        tx.upsert_local(&root)
    })
    .unwrap();
    (db, root)
}

/// Stages a local edit (the entry becomes dirty).
pub fn stage(db: &Db, meta: &FileMetadata) {
    db.with_tx(|tx| tx.upsert_local(meta)).unwrap();
}

/// Writes an entry straight into base, as if it had synced long ago.
pub fn set_base(db: &Db, meta: &FileMetadata) {
    db.with_tx(|tx| tx.upsert_base(meta)).unwrap();
}

/// Stages a document with encrypted content bytes.
pub fn stage_document(db: &Db, meta: &FileMetadata, plaintext: &[u8]) {
    let content = encrypt(&key(), plaintext).unwrap();
    db.with_tx(|tx| {
        tx.upsert_local(meta)?;
        tx.put_document(meta.id, &content)
    })
    .unwrap();
}

/// Pushes a brand-new entry into the reference server, bypassing sync.
pub async fn seed_remote(gateway: &MemoryGateway, meta: &FileMetadata) -> Cursor {
    let diff = MetadataDiff {
        old: None,
        new: RemoteFileMetadata::seal(meta, &key()).unwrap(),
    };
    gateway.push_metadata(&diff).await.unwrap()
}

/// Pushes an updated state for an entry the server already holds.
pub async fn update_remote(
    gateway: &MemoryGateway,
    old: &FileMetadata,
    new: &FileMetadata,
) -> Cursor {
    let diff = MetadataDiff {
        old: Some(RemoteFileMetadata::seal(old, &key()).unwrap()),
        new: RemoteFileMetadata::seal(new, &key()).unwrap(),
    };
    gateway.push_metadata(&diff).await.unwrap()
}

/// Seeds remote content for a document already on the server.
pub async fn seed_remote_content(gateway: &MemoryGateway, id: FileId, plaintext: &[u8]) {
    let content = encrypt(&key(), plaintext).unwrap();
    gateway.push_content(id, &content).await.unwrap();
}

pub fn folder(parent: FileId, name: &str) -> FileMetadata {
    FileMetadata::new(parent, name, FileKind::Folder)
}

pub fn document(parent: FileId, name: &str) -> FileMetadata {
    FileMetadata::new(parent, name, FileKind::Document)
}

pub fn decrypt_text(bytes: &EncryptedBytes) -> String {
    String::from_utf8(satchel_crypto::decrypt(&key(), bytes).unwrap()).unwrap()
}

/// Gateway wrapper that fails every call once its fuse runs out. Used to
/// simulate a network loss partway through a pass.
pub struct FailingGateway {
    pub inner: Arc<MemoryGateway>,
    calls_left: AtomicUsize,
}

impl FailingGateway {
    pub fn new(inner: Arc<MemoryGateway>, calls_before_failure: usize) -> Self {
        Self { inner, calls_left: AtomicUsize::new(calls_before_failure) }
    }

    fn spend(&self) -> Result<(), RemoteError> {
        let left = self.calls_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            n.checked_sub(1)
        });
        match left {
            Ok(_) => Ok(()),
            Err(_) => Err(RemoteError::Network("simulated network loss".to_string())),
        }
    }
}

/// Gateway wrapper that parks `fetch_changes` until the test releases it,
/// for observing in-progress passes deterministically.
pub struct GatedGateway {
    pub inner: Arc<MemoryGateway>,
    pub gate: Arc<tokio::sync::Semaphore>,
}

impl GatedGateway {
    pub fn new(inner: Arc<MemoryGateway>) -> (Self, Arc<tokio::sync::Semaphore>) {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        (Self { inner, gate: gate.clone() }, gate)
    }
}

#[async_trait]
impl RemoteGateway for GatedGateway {
    async fn fetch_changes(&self, since: Cursor) -> Result<ChangeSet, RemoteError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| RemoteError::Network("gate closed".to_string()))?;
        self.inner.fetch_changes(since).await
    }

    async fn push_metadata(&self, diff: &MetadataDiff) -> Result<Cursor, RemoteError> {
        self.inner.push_metadata(diff).await
    }

    async fn fetch_content(&self, id: FileId) -> Result<EncryptedBytes, RemoteError> {
        self.inner.fetch_content(id).await
    }

    async fn push_content(&self, id: FileId, content: &EncryptedBytes) -> Result<(), RemoteError> {
        self.inner.push_content(id, content).await
    }
}

#[async_trait]
impl RemoteGateway for FailingGateway {
    async fn fetch_changes(&self, since: Cursor) -> Result<ChangeSet, RemoteError> {
        self.spend()?;
        self.inner.fetch_changes(since).await
    }

    async fn push_metadata(&self, diff: &MetadataDiff) -> Result<Cursor, RemoteError> {
        self.spend()?;
        self.inner.push_metadata(diff).await
    }

    async fn fetch_content(&self, id: FileId) -> Result<EncryptedBytes, RemoteError> {
        self.spend()?;
        self.inner.fetch_content(id).await
    }

    async fn push_content(&self, id: FileId, content: &EncryptedBytes) -> Result<(), RemoteError> {
        self.spend()?;
        self.inner.push_content(id, content).await
    }
}
